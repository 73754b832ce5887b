//! Logging macros for the kernel
//!
//! With the `defmt` feature every level forwards to defmt. Without it the
//! macros compile to nothing, except in this crate's unit tests where they
//! print to stdout.

#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __kernel_log {
    (trace, $($arg:tt)*) => { ::defmt::trace!($($arg)*) };
    (debug, $($arg:tt)*) => { ::defmt::debug!($($arg)*) };
    (info, $($arg:tt)*) => { ::defmt::info!($($arg)*) };
    (warn, $($arg:tt)*) => { ::defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { ::defmt::error!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __kernel_log {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(test)]
        ::std::println!("[{}] {}", stringify!($level), format_args!($($arg)*));
        #[cfg(not(test))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

/// Trace message
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::__kernel_log!(trace, $($arg)*) };
}

/// Debug message
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::__kernel_log!(debug, $($arg)*) };
}

/// Info message
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::__kernel_log!(info, $($arg)*) };
}

/// Warning message
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::__kernel_log!(warn, $($arg)*) };
}

/// Error message
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::__kernel_log!(error, $($arg)*) };
}
