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

/// Zone used by the in-memory fixtures.
pub const DEFAULT_REGION: &str = "fr-par-1";

/// Placeholder API secret used where a non-empty key is required.
pub const SECRET_KEY: &str = "SCWSECRETKEYEXAMPLE";
