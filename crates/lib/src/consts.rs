use std::time::Duration;

/// Environment name used when a deployment does not set one.
pub const DEFAULT_ENVIRONMENT: &str = "default";

/// Placeholder rendered for values that only exist after apply.
pub const KNOWN_AFTER_APPLY: &str = "(known after apply)";

pub const OUTPUT_SNAPSHOT_VERSION: u32 = 1;
pub const LOCAL_STATE_VERSION: u32 = 1;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_STABILIZE_TIMEOUT: Duration = Duration::from_secs(600);
