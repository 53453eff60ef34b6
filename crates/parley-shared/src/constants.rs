/// Application name
pub const APP_NAME: &str = "Parley";

/// Prefix carried by every client-generated identifier until the server
/// assigns a permanent one.
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Default REST backend base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// SQLite file name inside the platform data directory
pub const DB_FILE_NAME: &str = "parley.db";

/// Display name substituted when an invite carries none
pub const UNKNOWN_USER_NAME: &str = "Unknown";

/// Separator joining both participants' names in `Chat::user_name`
pub const USER_NAME_SEPARATOR: char = ',';

/// Number of digits in an email OTP code
pub const OTP_LENGTH: usize = 6;

/// Seconds between two connectivity probes
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;

/// Per-request HTTP timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
