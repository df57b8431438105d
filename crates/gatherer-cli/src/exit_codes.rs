//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Configuration error - missing file, invalid YAML or failed validation
pub const CONFIG_ERROR: i32 = 2;

/// Cluster store not initialized - run `init` first
pub const NOT_INITIALIZED: i32 = 3;

/// Cluster error - connection, listing setup or store failure during sync
pub const CLUSTER_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
