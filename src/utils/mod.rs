/// Time sources
pub mod clock;
/// Constants
pub mod constants;
/// Logger
pub mod logger;
