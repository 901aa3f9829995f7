//! Provider configuration.

/// Identity the provider registers under with the host.
pub const DEFAULT_FILE_SYSTEM_ID: &str = "fullarmor_hapi";

/// Name the host shows for the mounted provider.
pub const DEFAULT_DISPLAY_NAME: &str = "FullArmor HAPI";

/// Consecutive recovery attempts before a session is torn down.
pub const DEFAULT_MAX_RETRIES: u8 = 3;

/// Configuration for a [`crate::ProviderAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Provider identity used for mount and unmount.
    pub file_system_id: String,

    /// Human-readable name shown by the host.
    pub display_name: String,

    /// Whether the host should treat the mount as writable.
    ///
    /// Default: true.
    pub writable: bool,

    /// How many relogin attempts a failing session gets before it is
    /// forced back to logged out. Resets after every clean completion.
    ///
    /// Default: 3.
    pub max_retries: u8,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            file_system_id: DEFAULT_FILE_SYSTEM_ID.to_string(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            writable: true,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn file_system_id(mut self, id: impl Into<String>) -> Self {
        self.file_system_id = id.into();
        self
    }

    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    #[must_use]
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Sets the recovery cap.
    #[must_use]
    pub fn max_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }
}
