//! Diagnostic sink for the codec.
//!
//! With the `logging` feature these macros forward to `tracing`; without it
//! they expand to nothing, so decoding pays nothing for the log statements.
//!
//! ```rust,ignore
//! use crate::logging::debug;
//!
//! debug!(slot = %slot, "suspending for storage slot");
//! ```

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { tracing::trace!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Mode changes and other once-per-decode events.
#[cfg(feature = "logging")]
macro_rules! log_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

pub(crate) use log_debug as debug;
pub(crate) use log_info as info;
pub(crate) use log_trace as trace;
pub(crate) use log_warn as warn;
