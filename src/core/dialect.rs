//! SMB dialect versions.

/// Negotiated SMB dialect.
///
/// Ordered by protocol revision, so ranges and `at_least` comparisons work
/// the way dialect checks are usually written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum Dialect {
    /// SMB 2.0.2
    Smb202 = 0x0202,
    /// SMB 2.1
    Smb210 = 0x0210,
    /// SMB 3.0
    Smb300 = 0x0300,
    /// SMB 3.0.2
    Smb302 = 0x0302,
    /// SMB 3.1.1
    Smb311 = 0x0311,
}

impl Dialect {
    /// Parse a dialect from its wire code.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0202 => Some(Self::Smb202),
            0x0210 => Some(Self::Smb210),
            0x0300 => Some(Self::Smb300),
            0x0302 => Some(Self::Smb302),
            0x0311 => Some(Self::Smb311),
            _ => None,
        }
    }

    /// Wire code of this dialect.
    pub fn as_code(self) -> u16 {
        self as u16
    }

    /// Whether this dialect is at least `other`.
    pub fn at_least(self, other: Dialect) -> bool {
        self >= other
    }

    /// Whether this dialect belongs to the SMB3 family.
    pub fn is_smb3(self) -> bool {
        self.at_least(Dialect::Smb300)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_ordering() {
        assert!(Dialect::Smb311.at_least(Dialect::Smb300));
        assert!(Dialect::Smb300.at_least(Dialect::Smb300));
        assert!(!Dialect::Smb210.at_least(Dialect::Smb300));
        assert!(Dialect::Smb302.is_smb3());
        assert!(!Dialect::Smb202.is_smb3());
    }

    #[test]
    fn test_dialect_codes() {
        for code in [0x0202, 0x0210, 0x0300, 0x0302, 0x0311] {
            assert_eq!(Dialect::from_code(code).unwrap().as_code(), code);
        }
        assert!(Dialect::from_code(0x02FF).is_none());
    }
}
