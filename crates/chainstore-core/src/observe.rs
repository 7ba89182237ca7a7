//! Optional metrics instrumentation.
//!
//! When the `observe` feature is enabled, storage operations emit counters,
//! histograms and gauges via the [`metrics`] crate. The node must install a
//! recorder to collect them.
//!
//! When the feature is **not** enabled every function in this module is a
//! zero-cost no-op.

/// Record a write transaction commit.
///
/// - `chainstore.commit.total` – counter with `store` label
/// - `chainstore.commit.operations_total` – counter of mutations committed
/// - `chainstore.commit.duration_seconds` – histogram
#[inline]
pub fn record_commit(store: &'static str, operations: usize, duration: std::time::Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chainstore.commit.total", "store" => store).increment(1);
        metrics::counter!("chainstore.commit.operations_total", "store" => store)
            .increment(operations as u64);
        metrics::histogram!("chainstore.commit.duration_seconds", "store" => store)
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (store, operations, duration);
    }
}

/// Record an explicit durability flush.
///
/// - `chainstore.flush.total` – counter with `store` label
/// - `chainstore.flush.duration_seconds` – histogram
#[inline]
pub fn record_flush(store: &'static str, duration: std::time::Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chainstore.flush.total", "store" => store).increment(1);
        metrics::histogram!("chainstore.flush.duration_seconds", "store" => store)
            .record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (store, duration);
    }
}

/// Record a map size change.
///
/// - `chainstore.map.resizes_total` – counter
/// - `chainstore.map.size_bytes` – gauge
#[inline]
pub fn record_resize(store: &'static str, map_size: usize) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chainstore.map.resizes_total", "store" => store).increment(1);
        metrics::gauge!("chainstore.map.size_bytes", "store" => store).set(map_size as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (store, map_size);
    }
}

/// Record the outcome of a snapshot renewal.
///
/// - `chainstore.snapshot.renewals_total` – counter with `outcome` label
#[inline]
pub fn record_renewal(outcome: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chainstore.snapshot.renewals_total", "outcome" => outcome)
            .increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = outcome;
    }
}

/// Set the cached block count gauge.
///
/// - `chainstore.ledger.block_count` – gauge
#[inline]
pub fn set_block_count(count: u32) {
    #[cfg(feature = "observe")]
    {
        metrics::gauge!("chainstore.ledger.block_count").set(count as f64);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = count;
    }
}
