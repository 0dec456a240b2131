//! Logging facilities for Pagewise.
//!
//! Pagewise uses the `tracing` crate for instrumentation. Nothing is printed
//! unless the application installs a subscriber:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("pagewise::cache=debug,pagewise::collection=debug")
//!     .init();
//! ```
//!
//! Remote service round trips are logged at `debug`, cache hits and signal
//! emission at `trace`, backing-store failures at `warn`.

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Signal and veto delivery.
    pub const SIGNAL: &str = "pagewise_core::signal";
    /// Query parameters and options.
    pub const QUERY: &str = "pagewise::query";
    /// Selection handling.
    pub const SELECTION: &str = "pagewise::selection";
    /// Added/updated/removed item bookkeeping.
    pub const MODIFICATION: &str = "pagewise::modification";
    /// Page-query block cache.
    pub const CACHE: &str = "pagewise::cache";
    /// Pageable collection strategies.
    pub const COLLECTION: &str = "pagewise::collection";
}

