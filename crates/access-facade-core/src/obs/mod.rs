//! Lightweight in-process metrics.
//!
//! Both facades record into one shared `FacadeMetrics`; the demo service
//! renders it on `/metrics` in Prometheus text format.

pub mod metrics;

pub use metrics::{CounterVec, FacadeMetrics, GaugeVec, HistogramVec};
