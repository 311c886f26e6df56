//! Metrics utilities and prometheus re-exports for ethindex.

mod gather;
mod timing;

pub use gather::{GatherError, gather_default_metrics};
pub use timing::TimingGuard;

// Re-export prometheus types and macros we use
pub use prometheus::Error as PrometheusError;
pub use prometheus::{
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder, gather,
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
};
