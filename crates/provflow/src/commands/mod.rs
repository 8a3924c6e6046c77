pub mod apply;
pub mod classify;

/// Configuration, preparation or internal error
pub const EXIT_ERROR: u8 = 1;
/// The session stopped on a fatal classification
pub const EXIT_FATAL: u8 = 2;
/// The session was canceled by a signal
pub const EXIT_CANCELED: u8 = 130;
