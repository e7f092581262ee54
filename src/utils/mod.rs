/// Date and duration formatting for replies
pub mod datetime;
/// Prefix-tagged structured log helpers
pub mod logging;
/// Command argument parsing and validation
pub mod validation;
