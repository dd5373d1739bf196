//! Version and build information.
//!
//! Provides version, git commit, and build metadata embedded by `build.rs`.

use std::fmt;

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit: Option<&'static str>,
    pub build_date: Option<&'static str>,
    pub target: &'static str,
    pub rustc_version: Option<&'static str>,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "quorumci {}", self.version)?;

        let details = [
            ("Commit", self.commit),
            ("Built", self.build_date),
            ("Target", Some(self.target)),
            ("Rustc", self.rustc_version),
        ];
        for (label, value) in details {
            if let Some(value) = value {
                write!(f, "\n{}: {}", label, value)?;
            }
        }

        Ok(())
    }
}

/// Get build information
pub fn get_build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("QUORUMCI_GIT_HASH"),
        build_date: option_env!("QUORUMCI_BUILD_DATE"),
        target: option_env!("QUORUMCI_TARGET").unwrap_or(std::env::consts::ARCH),
        rustc_version: option_env!("QUORUMCI_RUSTC_VERSION"),
    }
}
