use std::time::Duration;

use fleet_env::Settings;

use crate::error::ConfigurationError;
use crate::fleet::Thresholds;
use crate::movement::{MovementPattern, MovementSettings};

pub const DEFAULT_SEED: u64 = 42;

/// Validated runtime configuration of one fleet.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// ws://host:port
    pub server_address: String,
    pub module: String,
    pub capacity: usize,
    pub spawn_rate: usize,
    pub tick_frequency: u32,
    pub default_pattern: MovementPattern,
    pub control_interval: Duration,
    pub history_limit: usize,
    pub seed: u64,
    pub connect_timeout: Duration,
    pub ping_interval: Duration,
    /// 자원 조회 제한 시간
    pub probe_timeout: Duration,
    pub thresholds: Thresholds,
    pub movement: MovementSettings,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            server_address: "ws://127.0.0.1:3000".to_string(),
            module: "game".to_string(),
            capacity: 100,
            spawn_rate: 5,
            tick_frequency: 60,
            default_pattern: MovementPattern::Random,
            control_interval: Duration::from_secs(1),
            history_limit: 60,
            seed: DEFAULT_SEED,
            connect_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(1),
            probe_timeout: Duration::from_millis(500),
            thresholds: Thresholds::default(),
            movement: MovementSettings::default(),
        }
    }
}

pub fn positive(field: &'static str, value: i64) -> Result<i64, ConfigurationError> {
    if value > 0 {
        Ok(value)
    } else {
        Err(ConfigurationError::NonPositive { field, value })
    }
}

impl FleetConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        let fleet = &settings.fleet;

        let capacity = positive("capacity", fleet.capacity)? as usize;
        let spawn_rate = positive("spawn_rate", fleet.spawn_rate)? as usize;
        let tick_frequency = positive("tick_frequency", fleet.tick_frequency)?;
        let tick_frequency = u32::try_from(tick_frequency).map_err(|_| {
            ConfigurationError::NonPositive {
                field: "tick_frequency",
                value: tick_frequency,
            }
        })?;
        positive("movement.grid_size", i64::from(settings.movement.grid_size))?;
        positive("fleet.control_interval_ms", fleet.control_interval_ms as i64)?;
        positive("resource.timeout_ms", settings.resource.timeout_ms as i64)?;
        let default_pattern = fleet.default_pattern.parse::<MovementPattern>()?;

        Ok(Self {
            server_address: settings.server.ws_url(),
            module: settings.server.module.clone(),
            capacity,
            spawn_rate,
            tick_frequency,
            default_pattern,
            control_interval: Duration::from_millis(fleet.control_interval_ms),
            history_limit: fleet.history_limit.max(1),
            seed: fleet.seed.unwrap_or(DEFAULT_SEED),
            connect_timeout: Duration::from_millis(fleet.connect_timeout_ms),
            ping_interval: Duration::from_millis(fleet.ping_interval_ms),
            probe_timeout: Duration::from_millis(settings.resource.timeout_ms),
            thresholds: Thresholds {
                max_latency_ms: settings.thresholds.max_latency_ms,
                min_tick_rate: settings.thresholds.min_tick_rate,
                max_memory_mb: settings.thresholds.max_memory_mb,
            },
            movement: MovementSettings {
                circle_radius: settings.movement.circle_radius,
                grid_size: settings.movement.grid_size,
                grid_cell_size: settings.movement.grid_cell_size,
                move_speed: settings.movement.move_speed,
            },
        })
    }
}
