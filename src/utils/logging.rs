//! Logging switches for chatty modules.
//!
//! A module opts in by declaring `ENABLE_LOGS` and importing the macros from
//! the crate root:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = true;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("preview loop started");
//! ```
//!
//! Flipping the const to `false` silences the module without touching `RUST_LOG`.

#[doc(hidden)]
#[macro_export]
macro_rules! __gated_log {
    ($level:ident, $($arg:tt)*) => {
        if ENABLE_LOGS {
            ::log::$level!($($arg)*);
        }
    };
}

/// `log::debug!`, gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::__gated_log!(debug, $($arg)*)
    };
}

/// `log::info!`, gated on the calling module's `ENABLE_LOGS`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::__gated_log!(info, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::__gated_log!(warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::__gated_log!(error, $($arg)*)
    };
}
