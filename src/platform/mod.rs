//! Platform detection and dispatch to the matching socket decoder.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScanError};
use crate::host::{CommandRunner, FileSystem};
use crate::types::SocketRecord;

pub mod linux;
pub mod macos;
pub mod ps;
pub mod windows;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PlatformFamily {
    Linux,
    Windows,
    Darwin,
    FreeBsd,
    Other(String),
}

impl PlatformFamily {
    /// The family this binary was built for.
    pub fn detect() -> Self {
        PlatformFamily::from(std::env::consts::OS)
    }

    /// Whether sockets are correlated to processes through kernel inodes.
    pub fn uses_inodes(&self) -> bool {
        matches!(self, PlatformFamily::Linux)
    }
}

impl From<&str> for PlatformFamily {
    fn from(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "linux" => PlatformFamily::Linux,
            "windows" => PlatformFamily::Windows,
            "darwin" | "macos" => PlatformFamily::Darwin,
            "freebsd" => PlatformFamily::FreeBsd,
            other => PlatformFamily::Other(other.to_string()),
        }
    }
}

impl FromStr for PlatformFamily {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(PlatformFamily::from(s))
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformFamily::Linux => write!(f, "linux"),
            PlatformFamily::Windows => write!(f, "windows"),
            PlatformFamily::Darwin => write!(f, "darwin"),
            PlatformFamily::FreeBsd => write!(f, "freebsd"),
            PlatformFamily::Other(name) => write!(f, "{name}"),
        }
    }
}

impl From<String> for PlatformFamily {
    fn from(s: String) -> Self {
        PlatformFamily::from(s.as_str())
    }
}

impl From<PlatformFamily> for String {
    fn from(family: PlatformFamily) -> Self {
        family.to_string()
    }
}

/// Enumerate the host's sockets with the decoder for `family`.
///
/// Records come back without process or user associations; only the raw
/// owner identifiers (inode, pid, uid) the source reports are filled in.
pub fn enumerate(
    family: &PlatformFamily,
    runner: &dyn CommandRunner,
    fs: &dyn FileSystem,
) -> Result<Vec<SocketRecord>> {
    debug!(platform = %family, "enumerating sockets");
    match family {
        PlatformFamily::Linux => linux::list_sockets(fs),
        PlatformFamily::Windows => windows::list_sockets(runner),
        // Both ship (or can install) lsof.
        PlatformFamily::Darwin | PlatformFamily::FreeBsd => macos::list_sockets(runner),
        PlatformFamily::Other(name) => Err(ScanError::UnsupportedPlatform {
            platform: name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CommandOutput, LocalFileSystem};

    struct NoCommands;

    impl CommandRunner for NoCommands {
        fn run(&self, command: &str) -> Result<CommandOutput> {
            panic!("unexpected command: {command}");
        }
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("linux".parse::<PlatformFamily>().unwrap(), PlatformFamily::Linux);
        assert_eq!("macos".parse::<PlatformFamily>().unwrap(), PlatformFamily::Darwin);
        assert_eq!("Darwin".parse::<PlatformFamily>().unwrap(), PlatformFamily::Darwin);
        assert_eq!("FreeBSD".parse::<PlatformFamily>().unwrap(), PlatformFamily::FreeBsd);
        assert_eq!(
            "aix".parse::<PlatformFamily>().unwrap(),
            PlatformFamily::Other("aix".to_string())
        );
    }

    #[test]
    fn test_platform_display_roundtrip() {
        for family in [
            PlatformFamily::Linux,
            PlatformFamily::Windows,
            PlatformFamily::Darwin,
            PlatformFamily::FreeBsd,
        ] {
            assert_eq!(family.to_string().parse::<PlatformFamily>().unwrap(), family);
        }
    }

    #[test]
    fn test_detect_matches_build_target() {
        let family = PlatformFamily::detect();
        if cfg!(target_os = "linux") {
            assert_eq!(family, PlatformFamily::Linux);
        } else if cfg!(target_os = "macos") {
            assert_eq!(family, PlatformFamily::Darwin);
        }
    }

    #[test]
    fn test_enumerate_unsupported_platform() {
        let err = enumerate(
            &PlatformFamily::Other("aix".to_string()),
            &NoCommands,
            &LocalFileSystem::new(),
        )
        .unwrap_err();

        match err {
            ScanError::UnsupportedPlatform { platform } => assert_eq!(platform, "aix"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
