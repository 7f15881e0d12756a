use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::resource::ResourceUsage;
use crate::bot::BotMetrics;
use crate::movement::MovementPattern;

/// 패턴별 활성 봇 수. 세 패턴 모두 항상 키로 존재한다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternCounts(BTreeMap<MovementPattern, usize>);

impl Default for PatternCounts {
    fn default() -> Self {
        Self(MovementPattern::ALL.iter().map(|p| (*p, 0)).collect())
    }
}

impl PatternCounts {
    pub fn get(&self, pattern: MovementPattern) -> usize {
        self.0.get(&pattern).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, pattern: MovementPattern) {
        *self.0.entry(pattern).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, pattern: MovementPattern) {
        let count = self.0.entry(pattern).or_insert(0);
        *count = count.saturating_sub(1);
    }

    /// n 개 전부를 한 패턴에 귀속시킨다
    pub fn all_in(pattern: MovementPattern, n: usize) -> Self {
        let mut counts = Self::default();
        counts.0.insert(pattern, n);
        counts
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MovementPattern, usize)> + '_ {
        self.0.iter().map(|(p, n)| (*p, *n))
    }
}

/// Fleet-wide aggregate snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FleetMetrics {
    /// None 이면 아직 한 번도 집계되지 않은 상태
    pub taken_at: Option<DateTime<Utc>>,
    pub active_bots: usize,
    pub average_latency_ms: f64,
    pub average_tick_rate: f64,
    pub pattern_counts: PatternCounts,
    pub memory_usage_mb: f64,
    pub cpu_usage_percent: f64,
    pub failed_updates: u64,
}

/// Builds the next snapshot from the bots' own metrics.
///
/// Latency averages only bots that have measured one. Tick rate averages
/// `1000 / average_update_ms` over bots with at least one timed update. When no bot
/// contributes to a value, the previous snapshot's value is carried over.
pub fn aggregate(
    previous: &FleetMetrics,
    active_bots: usize,
    bots: &[BotMetrics],
    pattern_counts: PatternCounts,
    usage: ResourceUsage,
) -> FleetMetrics {
    let latencies: Vec<f64> = bots.iter().filter_map(|m| m.latency_ms).collect();
    let rates: Vec<f64> = bots.iter().filter_map(BotMetrics::tick_rate).collect();

    FleetMetrics {
        taken_at: Some(Utc::now()),
        active_bots,
        average_latency_ms: mean(&latencies).unwrap_or(previous.average_latency_ms),
        average_tick_rate: mean(&rates).unwrap_or(previous.average_tick_rate),
        pattern_counts,
        memory_usage_mb: usage.memory_mb,
        cpu_usage_percent: usage.cpu_percent,
        failed_updates: bots.iter().map(|m| m.failed_updates).sum(),
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// 최근 스냅샷을 limit 개까지 보관. 가득 차면 가장 오래된 것부터 버린다.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    limit: usize,
    entries: VecDeque<FleetMetrics>,
}

impl MetricsHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            entries: VecDeque::with_capacity(limit.max(1)),
        }
    }

    pub fn push(&mut self, snapshot: FleetMetrics) {
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(snapshot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&FleetMetrics> {
        self.entries.back()
    }

    /// 오래된 것부터
    pub fn to_vec(&self) -> Vec<FleetMetrics> {
        self.entries.iter().cloned().collect()
    }
}
