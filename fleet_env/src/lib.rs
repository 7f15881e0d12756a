use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// bot fleet 전체 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerEndpoint,
    pub fleet: FleetSettings,
    pub thresholds: ThresholdSettings,
    pub movement: MovementSettings,
    pub control: ControlSettings,
    pub resource: ResourceSettings,
    pub logging: LoggingSettings,
}

/// 부하를 받을 백엔드 주소
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// 접속 대상 모듈 이름. ws URL 의 마지막 path 로 붙는다.
    pub module: String,
}

impl ServerEndpoint {
    pub fn ws_url(&self) -> String {
        let protocol = if self.use_tls { "wss" } else { "ws" };
        format!("{}://{}:{}", protocol, self.host, self.port)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSettings {
    pub capacity: i64,
    pub spawn_rate: i64,
    pub tick_frequency: i64,
    pub default_pattern: String,
    pub control_interval_ms: u64,
    pub history_limit: usize,
    pub seed: Option<u64>,
    pub connect_timeout_ms: u64,
    pub ping_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdSettings {
    pub max_latency_ms: f64,
    pub min_tick_rate: f64,
    pub max_memory_mb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementSettings {
    pub circle_radius: f32,
    pub grid_size: u32,
    pub grid_cell_size: f32,
    pub move_speed: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlSettings {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSettings {
    /// 백엔드의 prometheus 엔드포인트. 없으면 memory/cpu 는 0 으로 보고된다.
    pub metrics_url: Option<String>,
    /// 한 번의 조회 제한 시간. control interval 보다 길면 interval 로 잘린다.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub directory: String,
    pub filename: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerEndpoint {
                host: "127.0.0.1".to_string(),
                port: 3000,
                use_tls: false,
                module: "game".to_string(),
            },
            fleet: FleetSettings {
                capacity: 100,
                spawn_rate: 5,
                tick_frequency: 60,
                default_pattern: "random".to_string(),
                control_interval_ms: 1_000,
                history_limit: 60,
                seed: None,
                connect_timeout_ms: 10_000,
                ping_interval_ms: 1_000,
            },
            thresholds: ThresholdSettings {
                max_latency_ms: 100.0,
                min_tick_rate: 30.0,
                max_memory_mb: 1_024.0,
            },
            movement: MovementSettings {
                circle_radius: 10.0,
                grid_size: 10,
                grid_cell_size: 2.0,
                move_speed: 0.1,
            },
            control: ControlSettings {
                bind_address: "127.0.0.1".to_string(),
                port: 9090,
            },
            resource: ResourceSettings {
                metrics_url: None,
                timeout_ms: 500,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                directory: "logs".to_string(),
                filename: "bot_fleet.log".to_string(),
            },
        }
    }
}

impl Settings {
    /// 기본값 → 설정 파일 → FLEET_ 환경 변수 순으로 덮어쓴다.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::get_config_dir().join("fleet.toml"));

        info!("Loading configuration from: {:?}", config_file);

        let settings = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            // 파일은 선택사항
            .add_source(File::from(config_file).required(false))
            // 예: FLEET_FLEET__CAPACITY=200
            .add_source(
                Environment::with_prefix("FLEET")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        debug!("Loaded configuration: {:?}", settings);
        Ok(settings)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from_str(s, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn get_config_dir() -> PathBuf {
        if let Ok(config_home) = std_env::var("XDG_CONFIG_HOME") {
            PathBuf::from(config_home).join("bot_fleet")
        } else if let Some(home_dir) = dirs::home_dir() {
            home_dir.join(".config").join("bot_fleet")
        } else {
            PathBuf::from("./config")
        }
    }

    /// 테스트 환경용: 짧은 타임아웃, trace 로그
    pub fn testing() -> Self {
        let mut settings = Self::default();
        settings.logging.level = "trace".to_string();
        settings.fleet.connect_timeout_ms = 1_000;
        settings.fleet.seed = Some(42);
        settings
    }
}

/// .env 로드 후 설정을 읽는다. `FLEET_` 변수는 .env 에 있어도 적용된다.
pub fn init(path: Option<&Path>) -> Result<Settings, ConfigError> {
    dotenv::dotenv().ok();

    let settings = Settings::load(path)?;
    info!("Fleet configuration initialized");
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_endpoint_url() {
        let endpoint = ServerEndpoint {
            host: "localhost".to_string(),
            port: 3000,
            use_tls: false,
            module: "game".to_string(),
        };
        assert_eq!(endpoint.ws_url(), "ws://localhost:3000");
        assert_eq!(endpoint.address(), "localhost:3000");

        let tls = ServerEndpoint {
            use_tls: true,
            ..endpoint
        };
        assert_eq!(tls.ws_url(), "wss://localhost:3000");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [fleet]
            capacity = 250
            default_pattern = "grid"

            [thresholds]
            max_latency_ms = 80.0
            "#,
        )
        .unwrap();

        assert_eq!(settings.fleet.capacity, 250);
        assert_eq!(settings.fleet.default_pattern, "grid");
        assert_eq!(settings.thresholds.max_latency_ms, 80.0);
        // 지정하지 않은 값은 기본값 유지
        assert_eq!(settings.fleet.spawn_rate, 5);
        assert_eq!(settings.movement.grid_size, 10);
    }

    #[test]
    fn test_init_without_config_file_uses_defaults() {
        let missing = std_env::temp_dir().join("bot_fleet_missing_config.toml");
        let settings = init(Some(&missing)).unwrap();
        assert_eq!(settings.server.module, "game");
        assert_eq!(settings.resource.timeout_ms, 500);
    }

    #[test]
    fn test_testing_profile() {
        let settings = Settings::testing();
        assert_eq!(settings.logging.level, "trace");
        assert_eq!(settings.fleet.seed, Some(42));
    }
}
