//! Prometheus metrics for the storage layer.

use std::sync::LazyLock;

use ethindex_metrics::{
    Histogram, IntCounter, IntCounterVec, TimingGuard, register_histogram, register_int_counter,
    register_int_counter_vec,
};

pub fn inc_blocks_saved() {
    static ETHINDEX_BLOCKS_SAVED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
        register_int_counter!("ethindex_blocks_saved_total", "Count of blocks written").unwrap()
    });
    ETHINDEX_BLOCKS_SAVED_TOTAL.inc();
}

/// Start timing a block save. The duration is recorded when the guard drops.
pub fn time_block_save() -> TimingGuard {
    static ETHINDEX_BLOCK_SAVE_TIME_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
        register_histogram!(
            "ethindex_block_save_time_seconds",
            "Duration to encode and write a block",
            vec![0.001, 0.005, 0.01, 0.05, 0.1, 1.0]
        )
        .unwrap()
    });
    TimingGuard::new(&ETHINDEX_BLOCK_SAVE_TIME_SECONDS)
}

/// Start timing a bulk-write flush.
pub fn time_bulk_flush() -> TimingGuard {
    static ETHINDEX_BULK_FLUSH_TIME_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
        register_histogram!(
            "ethindex_bulk_flush_time_seconds",
            "Duration to commit one bulk-write batch",
            vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0]
        )
        .unwrap()
    });
    TimingGuard::new(&ETHINDEX_BULK_FLUSH_TIME_SECONDS)
}

pub fn inc_bulk_rows_written(table: &str, rows: u64) {
    static ETHINDEX_BULK_ROWS_WRITTEN_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
        register_int_counter_vec!(
            "ethindex_bulk_rows_written_total",
            "Count of rows committed through bulk writes",
            &["table"]
        )
        .unwrap()
    });
    ETHINDEX_BULK_ROWS_WRITTEN_TOTAL
        .with_label_values(&[table])
        .inc_by(rows);
}
