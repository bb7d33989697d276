//! SMB2 header flags.

use crate::core::constants::{
    SMB2_FLAGS_ASYNC_COMMAND, SMB2_FLAGS_DFS_OPERATIONS, SMB2_FLAGS_PRIORITY_MASK,
    SMB2_FLAGS_RELATED_OPERATIONS, SMB2_FLAGS_REPLAY_OPERATION, SMB2_FLAGS_SERVER_TO_REDIR,
    SMB2_FLAGS_SIGNED,
};

/// Flags field of the SMB2 header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags(u32);

impl HeaderFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// Create flags from the raw wire value.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw wire value.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Set the given flag bits.
    pub fn insert(&mut self, bits: u32) {
        self.0 |= bits;
    }

    /// Clear the given flag bits.
    pub fn remove(&mut self, bits: u32) {
        self.0 &= !bits;
    }

    /// Whether all of the given flag bits are set.
    pub fn contains(self, bits: u32) -> bool {
        self.0 & bits == bits
    }

    /// Whether this message is a server-to-client response.
    pub fn is_response(self) -> bool {
        self.contains(SMB2_FLAGS_SERVER_TO_REDIR)
    }

    /// Whether this message uses async addressing.
    pub fn is_async(self) -> bool {
        self.contains(SMB2_FLAGS_ASYNC_COMMAND)
    }

    /// Whether this message is part of a related compound chain.
    pub fn is_related(self) -> bool {
        self.contains(SMB2_FLAGS_RELATED_OPERATIONS)
    }

    /// Whether the signed flag bit is set.
    ///
    /// Independent of whether a local digest exists; a signed message with
    /// no digest to verify it is vacuously valid.
    pub fn is_signed(self) -> bool {
        self.contains(SMB2_FLAGS_SIGNED)
    }

    /// Whether this operation targets a DFS namespace.
    pub fn is_dfs(self) -> bool {
        self.contains(SMB2_FLAGS_DFS_OPERATIONS)
    }

    /// Whether this message is a replay of an earlier operation.
    pub fn is_replay(self) -> bool {
        self.contains(SMB2_FLAGS_REPLAY_OPERATION)
    }

    /// Message priority (0-7), extracted from the priority mask bits.
    pub fn priority(self) -> u8 {
        ((self.0 & SMB2_FLAGS_PRIORITY_MASK) >> 4) as u8
    }
}

impl std::fmt::LowerHex for HeaderFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        let mut flags = HeaderFlags::NONE;
        flags.insert(SMB2_FLAGS_SERVER_TO_REDIR | SMB2_FLAGS_SIGNED);
        assert!(flags.is_response());
        assert!(flags.is_signed());
        assert!(!flags.is_async());

        flags.remove(SMB2_FLAGS_SIGNED);
        assert!(!flags.is_signed());
        assert_eq!(flags.bits(), SMB2_FLAGS_SERVER_TO_REDIR);
    }

    #[test]
    fn test_priority_extraction() {
        let flags = HeaderFlags::from_bits(0x0000_0070);
        assert_eq!(flags.priority(), 7);
        let flags = HeaderFlags::from_bits(0x0000_0020);
        assert_eq!(flags.priority(), 2);
    }

    #[test]
    fn test_wire_bit_values() {
        assert!(HeaderFlags::from_bits(0x1000_0000).is_dfs());
        assert!(HeaderFlags::from_bits(0x2000_0000).is_replay());
        assert!(HeaderFlags::from_bits(0x2).is_async());
        assert!(HeaderFlags::from_bits(0x4).is_related());
    }
}
