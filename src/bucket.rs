//! Physical bucket naming.
//!
//! Logical names are hashed with SHA-256 and rendered as lowercase hex. The
//! final hex digit is dropped so the result fits the 63 character limit that
//! S3 places on bucket names while staying within its lowercase charset.

use std::fmt::Write as _;

use sha2::{Digest, Sha256};

/// Length of every name returned by [`bucket_name`].
pub const BUCKET_NAME_LEN: usize = 63;

/// Maps a logical name to the physical bucket name used at the vendor.
///
/// The mapping is pure: the same input yields the same output across
/// process restarts.
#[must_use]
pub fn bucket_name(logical: &str) -> String {
    let digest = Sha256::digest(logical.as_bytes());
    let mut rendered = String::with_capacity(BUCKET_NAME_LEN + 1);
    for byte in digest {
        // Writing into a String cannot fail.
        write!(rendered, "{byte:02x}").ok();
    }
    rendered.pop();
    rendered
}
