//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Build identifier the fake allocations report unless a test overrides it.
pub const EXPECTED_BUILD: &str = "build-42";

/// Access key used by S3 credential payloads.
pub const ACCESS_KEY: &str = "AKIAEXAMPLE";

/// Secret key used by S3 credential payloads.
pub const SECRET_KEY: &str = "wJalrXUtnFEMI";

/// Region used by S3 credential payloads.
pub const REGION: &str = "us-east-1";
