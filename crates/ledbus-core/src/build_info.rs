//! Build metadata embedded by `build.rs`, logged by both binaries at startup.

/// Short git commit hash, suffixed with `-dirty` for uncommitted trees.
pub const GIT_HASH: &str = env!("LEDBUS_GIT_HASH");

/// Build time as Unix epoch seconds.
pub const BUILD_TIMESTAMP: &str = env!("LEDBUS_BUILD_TIMESTAMP");

/// Cargo profile (`debug` or `release`).
pub const BUILD_PROFILE: &str = env!("LEDBUS_BUILD_PROFILE");

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// e.g. `"0.1.0 (abc1234, debug)"`
pub fn version_string() -> String {
    format!("{VERSION} ({GIT_HASH}, {BUILD_PROFILE})")
}
