//! Logging macros that forward to the `log` crate when the `log` feature is enabled.
//!
//! Without the feature, arguments are still type-checked via `format_args!`, but no code is
//! generated.

#[cfg(feature = "log")]
macro_rules! log_forward {
    ($level:ident, $($t:tt)*) => {{ log::$level!($($t)*); }};
}

#[cfg(not(feature = "log"))]
macro_rules! log_forward {
    ($level:ident, $($t:tt)*) => {{ format_args!($($t)*); }};
}

macro_rules! error {
    ($($t:tt)*) => { log_forward!(error, $($t)*) };
}

macro_rules! warn {
    ($($t:tt)*) => { log_forward!(warn, $($t)*) };
}

macro_rules! info {
    ($($t:tt)*) => { log_forward!(info, $($t)*) };
}

macro_rules! debug {
    ($($t:tt)*) => { log_forward!(debug, $($t)*) };
}

macro_rules! trace {
    ($($t:tt)*) => { log_forward!(trace, $($t)*) };
}
