//! Host Inspection
//!
//! Lower-cased OS/architecture identifiers and the core count used as the
//! default build concurrency.

use std::env::consts;

/// Host operating system and architecture identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub os: String,
    pub arch: String,
}

impl HostInfo {
    /// Identify the running host
    pub fn detect() -> Self {
        Self {
            os: consts::OS.to_string(),
            arch: consts::ARCH.to_string(),
        }
    }
}

/// Number of logical CPU cores
pub fn cpu_count() -> u32 {
    num_cpus::get() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_is_lowercase() {
        let host = HostInfo::detect();
        assert!(!host.os.is_empty());
        assert!(!host.arch.is_empty());
        assert_eq!(host.os, host.os.to_lowercase());
        assert_eq!(host.arch, host.arch.to_lowercase());
    }

    #[test]
    fn test_cpu_count_positive() {
        assert!(cpu_count() >= 1);
    }
}
