//! Prometheus metrics for the CDC pipeline

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, HistogramVec};

lazy_static! {
    /// Total events published
    pub static ref CDC_PUBLISH_TOTAL: CounterVec = register_counter_vec!(
        "cdc_publish_total",
        "Total transfer events published",
        &["event_type", "status"]
    )
    .unwrap();

    /// Event publish duration
    pub static ref CDC_PUBLISH_DURATION: HistogramVec = register_histogram_vec!(
        "cdc_publish_duration_seconds",
        "Transfer event publish duration in seconds",
        &["event_type"]
    )
    .unwrap();

    /// Total deliveries received
    pub static ref CDC_RECEIVE_TOTAL: CounterVec = register_counter_vec!(
        "cdc_receive_total",
        "Total deliveries received",
        &["status"]
    )
    .unwrap();

    /// Handler dispatch duration
    pub static ref CDC_PROCESS_DURATION: HistogramVec = register_histogram_vec!(
        "cdc_process_duration_seconds",
        "Delivery processing duration in seconds",
        &["event_type"]
    )
    .unwrap();
}
