pub mod metrics;
pub mod resource;
pub mod thresholds;

pub use metrics::{aggregate, FleetMetrics, MetricsHistory, PatternCounts};
pub use resource::{NullProbe, PrometheusProbe, ResourceProbe, ResourceUsage};
pub use thresholds::{ThresholdBreach, Thresholds};
