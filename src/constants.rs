//! Application-wide constants
//!
//! Host page markers, bridge keys and timing values live here so the engine,
//! the simulated host and the CLI agree on a single source of truth.

/// Host page markers (selectors, classes and attributes)
pub mod dom {
    /// Container that holds the color token rows
    pub const CONTAINER_SELECTOR: &str = ".tokens-editor-wrapper.colors";

    /// Class added to a row once it has been verified
    pub const DRAGGABLE_CLASS: &str = "draggable-custom-color";

    /// Attribute carrying the token id on a verified row
    pub const DATA_ID_ATTR: &str = "data-id";

    /// Drag handle inside each row
    pub const HANDLE_SELECTOR: &str = ".token-name-and-edit";

    /// Id of the save trigger inserted once per page
    pub const SAVE_TRIGGER_ID: &str = "sortable-save-button";

    /// Label of the save trigger
    pub const SAVE_TRIGGER_LABEL: &str = "\u{1F4BE} Save New Order";
}

/// Drag capability tuning
pub mod drag {
    /// Reorder animation duration in milliseconds
    pub const ANIMATION_MS: u32 = 150;

    /// Class applied to the placeholder while dragging
    pub const GHOST_CLASS: &str = "sortable-ghost";

    /// Class applied to the element being dragged
    pub const DRAG_CLASS: &str = "sortable-drag";
}

/// Config bridge keys
pub mod bridge {
    /// Setting key under which the host stores the user color tokens
    pub const SETTING_KEY: &str = "color_tokens_user";

    /// Writes through the bridge are always persisted
    pub const PERSIST: bool = true;
}

/// Engine timing
pub mod timing {
    /// Cooldown before another reset may be triggered
    pub const RESET_COOLDOWN_MS: u64 = 500;

    /// Delay after a commit before re-verifying the rendered rows
    pub const SETTLE_DELAY_MS: u64 = 200;

    /// Number of diagnostics kept in the engine history
    pub const DIAGNOSTIC_HISTORY: usize = 64;
}

/// Configuration file locations and validation limits
pub mod config {
    /// Application directory name under the user config dir
    pub const APP_DIR: &str = "swatch-order";

    /// Engine configuration file name
    pub const FILENAME: &str = "config.json";

    /// Default settings store file name (sits next to the config file)
    pub const SETTINGS_FILENAME: &str = "settings.json";

    /// Longest cooldown or settle delay accepted from config
    pub const MAX_DELAY_MS: u64 = 60_000;

    /// Shortest reset cooldown accepted from config
    pub const MIN_RESET_COOLDOWN_MS: u64 = 50;
}
