use std::fmt;
use std::ops::BitOr;

/// Flags byte of a directory entry.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EntryFlags(u8);

impl EntryFlags {
    pub const DIRECTORY: Self = Self(1);
    pub const FILE: Self = Self(2);
    pub const EXECUTABLE: Self = Self(4);
    pub const READ_ONLY: Self = Self(8);
    /// UTF-8 text; clients may rewrite line endings.
    pub const TEXT: Self = Self(16);
    pub const HAS_GIT_SHA1: Self = Self(32);
    /// Content is a Perforce depot path and revision rather than file data.
    pub const PERFORCE_DEPOT_PATH_AND_REVISION: Self = Self(64);

    const NAMES: [(Self, &'static str); 7] = [
        (Self::DIRECTORY, "directory"),
        (Self::FILE, "file"),
        (Self::EXECUTABLE, "executable"),
        (Self::READ_ONLY, "read-only"),
        (Self::TEXT, "text"),
        (Self::HAS_GIT_SHA1, "git-sha1"),
        (Self::PERFORCE_DEPOT_PATH_AND_REVISION, "perforce"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_directory(self) -> bool {
        self.contains(Self::DIRECTORY)
    }

    pub const fn is_file(self) -> bool {
        self.contains(Self::FILE)
    }
}

impl BitOr for EntryFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

impl fmt::Debug for EntryFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryFlags({self})")
    }
}
