//! Exit codes for the CLI.
//!
//! These follow common Unix conventions and provide meaningful
//! status information for scripting and automation.

/// Successful execution
pub const SUCCESS: u8 = 0;

/// General/unspecified error
pub const GENERAL_ERROR: u8 = 1;

/// Not logged in, or the stored credential was rejected
pub const AUTH_FAILED: u8 = 3;

/// Configuration file missing fields or unparsable
pub const CONFIG_INVALID: u8 = 4;

/// Permission denied (local filesystem)
pub const PERMISSION_DENIED: u8 = 5;

/// Upload never verified, or the service could not be reached
pub const TRANSFER_FAILED: u8 = 6;

/// Document not found
pub const NOT_FOUND: u8 = 7;

/// A different kind of entry already exists at the path
pub const CONFLICT: u8 = 8;
