pub mod interceptors;
pub use interceptors::{
    Cache, CacheInvalidate, Counted, LogLevel, Logged, MetricTimed, Timed, log_at_level,
};

pub mod prelude {
    //! Re-exports of the most commonly used utility interceptors.
    pub use crate::interceptors::{Cache, CacheInvalidate, Counted, Logged, MetricTimed, Timed};
}
