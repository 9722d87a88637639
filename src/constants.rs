//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Settings file and durable workspace locations
pub mod config {
    /// Directory name under the platform config/data dirs
    pub const APP_DIR: &str = "site-planner";

    /// Settings file name
    pub const FILENAME: &str = "config.json";

    /// Durable workspace mirror file name
    pub const WORKSPACE_FILENAME: &str = "workspace.json";

    /// Environment variable overriding the backend base URL
    pub const ENV_API_URL: &str = "SITE_PLANNER_API_URL";

    /// Environment variable selecting the log level
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Remote backend defaults
pub mod api {
    /// Base URL used when nothing else is configured
    pub const DEFAULT_URL: &str = "http://localhost:8080/api";

    /// Request timeout in seconds
    pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

    pub const CALCULATE_PATH: &str = "calculate";
    pub const SESSIONS_PATH: &str = "sessions";
    pub const SAVE_PATH: &str = "save";
    pub const LOAD_PATH: &str = "load";
    pub const DELETE_PATH: &str = "delete";
}

/// Layout recompute scheduling
pub mod layout {
    /// Quiet period before a changed configuration is sent for layout
    pub const DEBOUNCE_MS: u64 = 300;
}

/// Workspace tab defaults
pub mod tabs {
    /// Id given to the first tab of a fresh workspace
    pub const FIRST_TAB_ID: u32 = 1;

    /// Prefix of generated tab names ("Design 3")
    pub const DEFAULT_NAME_PREFIX: &str = "Design";

    /// Durable snapshot format version
    pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;
}

/// Settings validation limits
pub mod validation {
    pub const MAX_DEBOUNCE_MS: u64 = 10_000;
    pub const MIN_TIMEOUT_SECS: u64 = 1;
    pub const MAX_TIMEOUT_SECS: u64 = 300;

    /// Largest count per device type; four battery types at this count still
    /// need fewer than `u32::MAX` transformers
    pub const MAX_DEVICE_COUNT: u32 = u32::MAX / 4;
}
