//! Centralized default constants for docreq.
//!
//! All crates reference these constants instead of defining their own
//! magic values.

// =============================================================================
// WORKFLOW
// =============================================================================

/// Public base URL used to build upload links when none is configured.
pub const PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Path segment under the public base URL that serves upload forms.
pub const UPLOAD_PATH: &str = "/upload/";

/// Lifetime of presigned file download URLs, in hours.
pub const DOWNLOAD_URL_EXPIRATION_HOURS: u64 = 24;

/// Longest accepted download URL lifetime, in hours (the S3 presign limit of 7 days).
pub const MAX_DOWNLOAD_URL_EXPIRATION_HOURS: u64 = 168;

/// Object store bucket when none is configured.
pub const FILE_BUCKET: &str = "docreq-files";

/// Text placed between the operator's message and the upload link.
pub const UPLOAD_INSTRUCTIONS: &str = "Please upload the required document using this link:";

// =============================================================================
// HTTP
// =============================================================================

/// Maximum accepted upload body, in bytes (25 MiB).
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Upload requests allowed per rate-limit period.
pub const RATE_LIMIT_REQUESTS: u32 = 30;

/// Rate-limit period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

// =============================================================================
// MAIL
// =============================================================================

/// Timeout for a single mail API request, in seconds.
pub const MAIL_TIMEOUT_SECS: u64 = 10;
