use serde::{Deserialize, Serialize};

/// Daemon or client version, negotiated during the handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl VersionInfo {
    pub fn new(major: u32, minor: u32, release: u32) -> Self {
        Self {
            major,
            minor,
            release,
        }
    }

    /// The RPC surface is stable within a major version.
    pub fn compatible_with(&self, other: &VersionInfo) -> bool {
        self.major == other.major
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.release)
    }
}
