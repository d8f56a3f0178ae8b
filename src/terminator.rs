//! Fatal error reporting for the C entry points
//!
//! Errors that cross the C boundary cannot be returned, so they terminate
//! the process. The message names the source location that detected the
//! failure.

use std::fmt;
use std::panic::Location;

use crate::error::Result;

/// Report `message` with the caller's location and abort the process.
#[cold]
#[inline(never)]
#[track_caller]
pub fn crash(message: impl fmt::Display) -> ! {
    let location = Location::caller();
    tracing::error!(
        file = location.file(),
        line = location.line(),
        "fatal launch error: {}",
        message
    );
    eprintln!(
        "[gridr] fatal: {} ({}:{})",
        message,
        location.file(),
        location.line()
    );
    std::process::abort()
}

/// Unwrap a result or abort via [`crash`].
pub trait OrCrash<T> {
    /// The `Ok` value, or abort with the error as message.
    fn or_crash(self) -> T;
}

impl<T> OrCrash<T> for Result<T> {
    #[track_caller]
    fn or_crash(self) -> T {
        match self {
            Ok(value) => value,
            Err(e) => crash(e),
        }
    }
}
