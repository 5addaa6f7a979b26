//! Logging macros for ipam-core call sites
//!
//! Each expands to a single `tracing` event with no trailing semicolon, so
//! a macro can stand as a match arm or the tail of a block.

/// Progress line at `info`; shown on the console at the default filter.
#[macro_export]
macro_rules! log_stderr {
    ($($arg:tt)*) => {
        ::tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        ::tracing::debug!($($arg)*)
    };
}

/// Recoverable problem: a skipped host, a dropped lookup, a failed upsert.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        ::tracing::warn!($($arg)*)
    };
}

/// Failure that ends a command.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        ::tracing::error!($($arg)*)
    };
}

#[cfg(test)]
mod tests {
    #[test]
    fn macros_work_in_expression_position() {
        let outcome: Result<(), &str> = Err("boom");
        match outcome {
            Ok(()) => crate::log_debug!("fine"),
            Err(e) => crate::log_warn!("failed: {}", e),
        }
        let logged = |n: usize| crate::log_stderr!("tail of closure {}", n);
        logged(1);
    }
}
