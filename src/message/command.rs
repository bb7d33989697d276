//! SMB2 command codes.

use std::fmt;

/// SMB2 command identifiers.
///
/// Covers every command of the SMB2/SMB3 command set; whether a given body
/// serializer is actually implemented is the resource layer's concern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    /// Negotiate protocol.
    Negotiate = 0x0000,
    /// Session setup.
    SessionSetup = 0x0001,
    /// Logoff.
    Logoff = 0x0002,
    /// Tree connect.
    TreeConnect = 0x0003,
    /// Tree disconnect.
    TreeDisconnect = 0x0004,
    /// Create/open file.
    Create = 0x0005,
    /// Close file.
    Close = 0x0006,
    /// Flush file.
    Flush = 0x0007,
    /// Read file.
    Read = 0x0008,
    /// Write file.
    Write = 0x0009,
    /// Lock file.
    Lock = 0x000A,
    /// IO control.
    Ioctl = 0x000B,
    /// Cancel an outstanding request.
    Cancel = 0x000C,
    /// Echo/keepalive.
    Echo = 0x000D,
    /// Query directory.
    QueryDirectory = 0x000E,
    /// Change notify.
    ChangeNotify = 0x000F,
    /// Query info.
    QueryInfo = 0x0010,
    /// Set info.
    SetInfo = 0x0011,
    /// Opportunistic lock break notification.
    OplockBreak = 0x0012,
}

impl Command {
    /// Parse a command from its wire code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0000 => Some(Self::Negotiate),
            0x0001 => Some(Self::SessionSetup),
            0x0002 => Some(Self::Logoff),
            0x0003 => Some(Self::TreeConnect),
            0x0004 => Some(Self::TreeDisconnect),
            0x0005 => Some(Self::Create),
            0x0006 => Some(Self::Close),
            0x0007 => Some(Self::Flush),
            0x0008 => Some(Self::Read),
            0x0009 => Some(Self::Write),
            0x000A => Some(Self::Lock),
            0x000B => Some(Self::Ioctl),
            0x000C => Some(Self::Cancel),
            0x000D => Some(Self::Echo),
            0x000E => Some(Self::QueryDirectory),
            0x000F => Some(Self::ChangeNotify),
            0x0010 => Some(Self::QueryInfo),
            0x0011 => Some(Self::SetInfo),
            0x0012 => Some(Self::OplockBreak),
            _ => None,
        }
    }

    /// Wire code of this command.
    pub fn as_code(self) -> u16 {
        self as u16
    }

    /// Protocol name of this command.
    pub fn name(self) -> &'static str {
        match self {
            Self::Negotiate => "SMB2_NEGOTIATE",
            Self::SessionSetup => "SMB2_SESSION_SETUP",
            Self::Logoff => "SMB2_LOGOFF",
            Self::TreeConnect => "SMB2_TREE_CONNECT",
            Self::TreeDisconnect => "SMB2_TREE_DISCONNECT",
            Self::Create => "SMB2_CREATE",
            Self::Close => "SMB2_CLOSE",
            Self::Flush => "SMB2_FLUSH",
            Self::Read => "SMB2_READ",
            Self::Write => "SMB2_WRITE",
            Self::Lock => "SMB2_LOCK",
            Self::Ioctl => "SMB2_IOCTL",
            Self::Cancel => "SMB2_CANCEL",
            Self::Echo => "SMB2_ECHO",
            Self::QueryDirectory => "SMB2_QUERY_DIRECTORY",
            Self::ChangeNotify => "SMB2_CHANGE_NOTIFY",
            Self::QueryInfo => "SMB2_QUERY_INFO",
            Self::SetInfo => "SMB2_SET_INFO",
            Self::OplockBreak => "SMB2_OPLOCK_BREAK",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
