//! Temporary bus directories.

use std::path::PathBuf;

use ledbus_config::AppConfig;
use tempfile::TempDir;

use crate::config::TestConfigBuilder;

/// A bus rendezvous directory that lives as long as this value.
///
/// The directory is deleted when dropped, guaranteeing cleanup even on
/// panic.
pub struct TestBus {
    dir: TempDir,
}

impl TestBus {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp bus dir"),
        }
    }

    /// Path of a registry subdirectory (`peers`, `names`, `adverts`).
    pub fn subdir(&self, sub: &str) -> PathBuf {
        self.dir.path().join(sub)
    }

    pub fn peers_dir(&self) -> PathBuf {
        self.subdir("peers")
    }

    /// A config builder already pointed at this bus.
    pub fn builder(&self) -> TestConfigBuilder {
        TestConfigBuilder::new().bus_dir(self.dir.path())
    }

    /// Default test config pointed at this bus.
    pub fn config(&self) -> AppConfig {
        self.builder().build()
    }

    /// Sorted file names in a registry subdirectory (`peers`, `names`,
    /// `adverts`), skipping temp files. Empty if the directory is missing.
    pub fn entries(&self, sub: &str) -> Vec<String> {
        let Ok(read) = std::fs::read_dir(self.subdir(sub)) else {
            return Vec::new();
        };
        let mut names: Vec<String> = read
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| !n.starts_with('.'))
            .collect();
        names.sort();
        names
    }
}

impl Default for TestBus {
    fn default() -> Self {
        Self::new()
    }
}
