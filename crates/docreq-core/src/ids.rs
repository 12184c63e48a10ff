//! Identifier generation.
//!
//! Record ids are UUIDv7 so they sort by creation time in logs and indexes.
//! Upload tokens are UUIDv4: they are bearer credentials and carry no
//! timestamp, only 122 random bits.

use uuid::Uuid;

/// Generate a new UUIDv7 record identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Generate a fresh, unguessable upload token.
pub fn new_upload_token() -> String {
    Uuid::new_v4().as_hyphenated().to_string()
}
