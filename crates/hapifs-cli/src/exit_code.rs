//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and give scripts a stable way to
//! tell provider error codes apart.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error, including the provider's FAILED
pub const GENERAL_ERROR: u8 = 1;

/// Command-line usage error (bad arguments, unusable gatekeeper URL)
pub const USAGE_ERROR: u8 = 2;

/// Not logged in, login rejected, or session recovery aborted
pub const AUTH_FAILED: u8 = 3;

/// ACCESS_DENIED from the gatekeeper or the share-level guard
pub const PERMISSION_DENIED: u8 = 5;

/// The host could not mount or unmount the provider
pub const MOUNT_FAILED: u8 = 6;

/// NOT_FOUND
pub const NOT_FOUND: u8 = 7;

/// Operation cancelled or interrupted
pub const CANCELLED: u8 = 8;

/// EXISTS
pub const EXISTS: u8 = 9;

/// IN_USE
pub const IN_USE: u8 = 10;
