/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field so log consumers can filter by
/// subsystem. Domains in use: `sys` (engine lifecycle), `win` (named window
/// create/remove), `disp` (per-cycle dispatch), `conf` (configuration).
///
/// ```ignore
/// nw_info!(sys, windows = 3, "engine started");
/// nw_warn!(disp, error = %e, "dispatch cycle reported failures");
/// ```
///
/// The domain is a bare identifier, not a string.

#[doc(hidden)]
macro_rules! nw_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

#[allow(unused_macros)]
macro_rules! nw_error {
    ($domain:ident, $($rest:tt)*) => {
        nw_log!(error, $domain, $($rest)*)
    };
}

macro_rules! nw_warn {
    ($domain:ident, $($rest:tt)*) => {
        nw_log!(warn, $domain, $($rest)*)
    };
}

macro_rules! nw_info {
    ($domain:ident, $($rest:tt)*) => {
        nw_log!(info, $domain, $($rest)*)
    };
}

macro_rules! nw_debug {
    ($domain:ident, $($rest:tt)*) => {
        nw_log!(debug, $domain, $($rest)*)
    };
}

#[allow(unused_macros)]
macro_rules! nw_trace {
    ($domain:ident, $($rest:tt)*) => {
        nw_log!(trace, $domain, $($rest)*)
    };
}
