//! Shared constants for end-to-end tests
//!
//! When test accounts or timeouts change, update only this file.

// ============================================================================
// Test Accounts
// ============================================================================

/// Authorization code the fake identity provider accepts for the regular user
pub const TEST_USER_CODE: &str = "code-alice";

/// External id the fake identity provider reports for the regular user
pub const TEST_USER_EXTERNAL_ID: &str = "ext-alice";

/// Display name of the regular user
pub const TEST_USER_NAME: &str = "Alice";

/// Authorization code for a second user
pub const OTHER_USER_CODE: &str = "code-bob";

/// External id of the second user
pub const OTHER_USER_EXTERNAL_ID: &str = "ext-bob";

/// Display name of the second user
pub const OTHER_USER_NAME: &str = "Bob";

/// Code the fake identity provider rejects as an upstream failure
pub const BROKEN_PROVIDER_CODE: &str = "code-provider-down";

/// Signing secret shared by the test server and tests that mint tokens directly
pub const TEST_JWT_SECRET: &str = "e2e-test-secret";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
