use std::fmt;

use serde::{Deserialize, Serialize};

use super::metrics::FleetMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub max_latency_ms: f64,
    pub min_tick_rate: f64,
    pub max_memory_mb: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_latency_ms: 100.0,
            min_tick_rate: 30.0,
            max_memory_mb: 1_024.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "threshold", rename_all = "snake_case")]
pub enum ThresholdBreach {
    Latency { observed: f64, limit: f64 },
    TickRate { observed: f64, limit: f64 },
    Memory { observed: f64, limit: f64 },
}

impl ThresholdBreach {
    /// prometheus 라벨 값으로도 쓰인다
    pub fn name(&self) -> &'static str {
        match self {
            ThresholdBreach::Latency { .. } => "latency",
            ThresholdBreach::TickRate { .. } => "tick_rate",
            ThresholdBreach::Memory { .. } => "memory",
        }
    }
}

impl fmt::Display for ThresholdBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdBreach::Latency { observed, limit } => {
                write!(f, "average latency {:.2}ms exceeds {:.2}ms", observed, limit)
            }
            ThresholdBreach::TickRate { observed, limit } => {
                write!(f, "average tick rate {:.2}/s is below {:.2}/s", observed, limit)
            }
            ThresholdBreach::Memory { observed, limit } => {
                write!(f, "memory usage {:.1}MB exceeds {:.1}MB", observed, limit)
            }
        }
    }
}

impl Thresholds {
    /// 세 조건은 서로 독립이다. 하나라도 걸리면 fleet 을 멈춘다.
    ///
    /// tick rate 는 아직 한 번도 계산되지 않았을 때(0) 검사하지 않는다.
    pub fn evaluate(&self, metrics: &FleetMetrics) -> Vec<ThresholdBreach> {
        let mut breaches = Vec::new();

        if metrics.average_latency_ms > self.max_latency_ms {
            breaches.push(ThresholdBreach::Latency {
                observed: metrics.average_latency_ms,
                limit: self.max_latency_ms,
            });
        }
        if metrics.average_tick_rate > 0.0 && metrics.average_tick_rate < self.min_tick_rate {
            breaches.push(ThresholdBreach::TickRate {
                observed: metrics.average_tick_rate,
                limit: self.min_tick_rate,
            });
        }
        if metrics.memory_usage_mb > self.max_memory_mb {
            breaches.push(ThresholdBreach::Memory {
                observed: metrics.memory_usage_mb,
                limit: self.max_memory_mb,
            });
        }

        breaches
    }
}
