/// Application name
pub const APP_NAME: &str = "taskchat";

/// Tolerance between a speculative message's local timestamp and the
/// server timestamp of its confirmed counterpart (seconds).
pub const RECONCILE_WINDOW_SECS: u64 = 60;

/// Largest image rendered as an inline preview while its upload is pending (8 MiB)
pub const MAX_INLINE_PREVIEW_BYTES: usize = 8 * 1024 * 1024;

/// Default bound on a batch attachment upload, in seconds
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 60;

/// Default bound on a single message submission, in seconds
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// Default bound on fetching the authoritative message list, in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 15;

/// Default interval between authoritative list refreshes, in seconds
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default REST API base URL (local development backend)
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080/api";

/// Capacity of the broadcast channels feeding the rendering layer
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
