//! Prometheus metrics for the epoch state engine.

use std::sync::LazyLock;

use ethindex_metrics::{
    Histogram, IntCounter, IntGauge, TimingGuard, register_histogram, register_int_counter,
    register_int_gauge,
};

pub fn update_current_epoch(epoch: u64) {
    static ETHINDEX_CURRENT_EPOCH: LazyLock<IntGauge> = LazyLock::new(|| {
        register_int_gauge!("ethindex_current_epoch", "Highest fully processed epoch").unwrap()
    });
    ETHINDEX_CURRENT_EPOCH.set(epoch.try_into().unwrap_or(i64::MAX));
}

pub fn update_tracked_validators(count: usize) {
    static ETHINDEX_TRACKED_VALIDATORS: LazyLock<IntGauge> = LazyLock::new(|| {
        register_int_gauge!(
            "ethindex_tracked_validators",
            "Number of validators in the current state snapshot"
        )
        .unwrap()
    });
    ETHINDEX_TRACKED_VALIDATORS.set(count.try_into().unwrap_or(i64::MAX));
}

pub fn inc_rejected_advances() {
    static ETHINDEX_EPOCH_ADVANCES_REJECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
        register_int_counter!(
            "ethindex_epoch_advances_rejected_total",
            "Count of epoch advances rejected for breaking continuity"
        )
        .unwrap()
    });
    ETHINDEX_EPOCH_ADVANCES_REJECTED_TOTAL.inc();
}

/// Start timing an epoch advance, including the snapshot write.
pub fn time_epoch_advance() -> TimingGuard {
    static ETHINDEX_EPOCH_ADVANCE_TIME_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
        register_histogram!(
            "ethindex_epoch_advance_time_seconds",
            "Duration to apply and persist one epoch",
            vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
        )
        .unwrap()
    });
    TimingGuard::new(&ETHINDEX_EPOCH_ADVANCE_TIME_SECONDS)
}
