//! The running operating system and architecture, named the way release
//! artifacts name them.
//!
//! Release archives and checksum manifests use `darwin`/`linux`/`windows`
//! and `x86_64`/`arm64`, so the Rust names are normalised on construction.

use std::fmt;

/// OS/arch pairs that receive release artifacts.
const SUPPORTED: &[(&str, &str)] = &[
    ("windows", "x86_64"),
    ("darwin", "x86_64"),
    ("darwin", "arm64"),
    ("linux", "x86_64"),
];

/// Error returned when the tool runs somewhere it is not released for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported platform: {os}/{arch}")]
pub struct UnsupportedPlatform {
    pub os: String,
    pub arch: String,
}

/// An OS/arch pair in release-artifact naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    os: String,
    arch: String,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Build a platform from arbitrary OS and arch names, normalising
    /// aliases (`macos` → `darwin`, `amd64` → `x86_64`, `aarch64` → `arm64`).
    pub fn new(os: &str, arch: &str) -> Self {
        let os = os.to_ascii_lowercase();
        let arch = arch.to_ascii_lowercase();
        let os = match os.as_str() {
            "macos" => "darwin".to_string(),
            _ => os,
        };
        let arch = match arch.as_str() {
            "amd64" => "x86_64".to_string(),
            "aarch64" => "arm64".to_string(),
            _ => arch,
        };
        Self { os, arch }
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }

    /// Returns `true` if `name` mentions both the OS and the arch token,
    /// ignoring case.
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        name.contains(&self.os) && name.contains(&self.arch)
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED
            .iter()
            .any(|(os, arch)| self.os == *os && self.arch == *arch)
    }

    /// Fail with [`UnsupportedPlatform`] unless release artifacts exist for
    /// this platform.
    pub fn check_supported(&self) -> Result<(), UnsupportedPlatform> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(UnsupportedPlatform {
                os: self.os.clone(),
                arch: self.arch.clone(),
            })
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}
