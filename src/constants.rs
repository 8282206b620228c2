// src/constants.rs

/// The name of the configuration file looked up from the current directory upwards.
pub const CONFIG_FILENAME: &str = "toolmesh.toml";

/// The directory name used under the platform cache directory.
pub const APP_DIR_NAME: &str = "toolmesh";

/// How many evaluations the history keeps when the configuration does not say.
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// The extension of a persisted evaluation record.
pub const RECORD_EXTENSION: &str = "json";

/// The `chrono` format of a record identifier. Fixed width, so lexical order is chronological.
pub const RECORD_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S-%6f";

/// Replaced by the source path in a command's arguments.
pub const SOURCE_PLACEHOLDER: &str = "{source}";
