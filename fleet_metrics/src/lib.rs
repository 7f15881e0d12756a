use lazy_static::lazy_static;
use prometheus::{
    opts, Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    // register_... 매크로 대신 Opts 만 만들고 register_custom_metrics 에서 수동 등록한다.

    /// Bots currently connected and owned by the fleet.
    pub static ref FLEET_ACTIVE_BOTS: IntGauge =
        IntGauge::with_opts(opts!("fleet_active_bots", "Number of connected bots owned by the fleet")).unwrap();

    /// Active bots per movement pattern.
    pub static ref FLEET_BOTS_BY_PATTERN: IntGaugeVec =
        IntGaugeVec::new(Opts::new("fleet_bots_by_pattern", "Active bots by movement pattern"), &[
            "pattern",
        ])
        .unwrap();

    pub static ref FLEET_AVERAGE_LATENCY_MS: Gauge =
        Gauge::with_opts(opts!("fleet_average_latency_ms", "Average round-trip latency across measured bots (ms)")).unwrap();

    pub static ref FLEET_AVERAGE_TICK_RATE: Gauge =
        Gauge::with_opts(opts!("fleet_average_tick_rate", "Average bot tick rate derived from update duration (ticks/s)")).unwrap();

    /// Backend resource usage as reported by the resource probe.
    pub static ref BACKEND_MEMORY_USAGE_MB: Gauge =
        Gauge::with_opts(opts!("backend_memory_usage_mb", "Backend memory usage (MB)")).unwrap();
    pub static ref BACKEND_CPU_USAGE_PERCENT: Gauge =
        Gauge::with_opts(opts!("backend_cpu_usage_percent", "Backend CPU usage (%)")).unwrap();

    pub static ref BOT_SPAWN_FAILURES_TOTAL: IntCounter =
        IntCounter::with_opts(opts!("bot_spawn_failures_total", "Bot spawns that failed to connect or register")).unwrap();

    /// Fleet shutdowns triggered by a breached threshold, by threshold name.
    pub static ref THRESHOLD_SHUTDOWNS_TOTAL: IntCounterVec =
        IntCounterVec::new(
            Opts::new("threshold_shutdowns_total", "Fleet shutdowns triggered by a breached threshold"),
            &["threshold"],
        )
        .unwrap();
}

pub fn register_custom_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    registry.register(Box::new(FLEET_ACTIVE_BOTS.clone()))?;
    registry.register(Box::new(FLEET_BOTS_BY_PATTERN.clone()))?;
    registry.register(Box::new(FLEET_AVERAGE_LATENCY_MS.clone()))?;
    registry.register(Box::new(FLEET_AVERAGE_TICK_RATE.clone()))?;
    registry.register(Box::new(BACKEND_MEMORY_USAGE_MB.clone()))?;
    registry.register(Box::new(BACKEND_CPU_USAGE_PERCENT.clone()))?;
    registry.register(Box::new(BOT_SPAWN_FAILURES_TOTAL.clone()))?;
    registry.register(Box::new(THRESHOLD_SHUTDOWNS_TOTAL.clone()))?;
    Ok(())
}

/// 집계 스냅샷 하나를 게이지에 반영한다.
pub fn record_snapshot(
    active_bots: usize,
    average_latency_ms: f64,
    average_tick_rate: f64,
    memory_mb: f64,
    cpu_percent: f64,
    by_pattern: &[(&str, usize)],
) {
    FLEET_ACTIVE_BOTS.set(active_bots as i64);
    FLEET_AVERAGE_LATENCY_MS.set(average_latency_ms);
    FLEET_AVERAGE_TICK_RATE.set(average_tick_rate);
    BACKEND_MEMORY_USAGE_MB.set(memory_mb);
    BACKEND_CPU_USAGE_PERCENT.set(cpu_percent);
    for (pattern, count) in by_pattern {
        FLEET_BOTS_BY_PATTERN
            .with_label_values(&[*pattern])
            .set(*count as i64);
    }
}

/// Prometheus text exposition format
pub fn encode_text(registry: &Registry) -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_exported() {
        let registry = Registry::new();
        register_custom_metrics(&registry).unwrap();

        record_snapshot(3, 42.5, 60.0, 512.0, 12.0, &[("grid", 3), ("circle", 0)]);
        THRESHOLD_SHUTDOWNS_TOTAL.with_label_values(&["latency"]).inc();

        let text = encode_text(&registry).unwrap();
        assert!(text.contains("fleet_active_bots 3"));
        assert!(text.contains("fleet_bots_by_pattern{pattern=\"grid\"} 3"));
        assert!(text.contains("threshold_shutdowns_total{threshold=\"latency\"}"));
    }
}
