use std::path::PathBuf;
use std::sync::Arc;

use actix::Actor;
use actix_web::{web, App, HttpServer};
use anyhow::Context as _;
use bot_fleet::{
    control::{self, ControlState},
    fleet::{NullProbe, PrometheusProbe, ResourceProbe},
    fleet_actor::message::{StartFleet, StopFleet},
    session::WsConnector,
    setup_logger, FleetActor, FleetConfig,
};
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "bot_fleet",
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
    long_about = None,
)]
struct Cli {
    /// 설정 파일 경로 (기본: $XDG_CONFIG_HOME/bot_fleet/fleet.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// 시작하자마자 control loop 를 돌린다
    #[arg(long)]
    autostart: bool,

    #[arg(long)]
    capacity: Option<i64>,

    #[arg(long = "spawn-rate")]
    spawn_rate: Option<i64>,

    /// random | circle | grid
    #[arg(long)]
    pattern: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1-2. .env + 설정 로드 후 CLI 값으로 덮어쓰기
    let mut settings = fleet_env::init(cli.config.as_deref()).context("Failed to load settings")?;
    if let Some(capacity) = cli.capacity {
        settings.fleet.capacity = capacity;
    }
    if let Some(spawn_rate) = cli.spawn_rate {
        settings.fleet.spawn_rate = spawn_rate;
    }
    if let Some(pattern) = cli.pattern {
        settings.fleet.default_pattern = pattern;
    }

    // 3. 로거 초기화
    let _guard = setup_logger(&settings.logging);

    let config = FleetConfig::from_settings(&settings).context("Invalid fleet configuration")?;

    // 4. Metrics
    let registry = prometheus::Registry::new();
    fleet_metrics::register_custom_metrics(&registry)
        .context("Failed to register custom metrics")?;

    // 5. Fleet actor
    let connector = Arc::new(WsConnector::new(config.connect_timeout, config.ping_interval));
    let probe: Arc<dyn ResourceProbe> = match &settings.resource.metrics_url {
        Some(url) => {
            let probe = PrometheusProbe::new(url.clone(), config.probe_timeout)
                .context("Failed to build resource probe client")?;
            info!("Sampling backend resources from {}", probe.url());
            Arc::new(probe)
        }
        None => Arc::new(NullProbe),
    };
    let fleet = FleetActor::new(config, connector, probe).start();

    if cli.autostart {
        fleet.send(StartFleet).await?;
    }

    // 6. 제어 서버
    let bind_address = format!("{}:{}", settings.control.bind_address, settings.control.port);
    let state = ControlState {
        fleet: fleet.clone(),
        registry,
    };
    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(control::configure)
    })
    .disable_signals()
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();
    info!("Control server listening on {}", bind_address);

    // 7. 종료 신호 대기
    tokio::select! {
        res = &mut server => {
            error!("Control server exited unexpectedly");
            fleet.send(StopFleet).await?;
            return res.map_err(Into::into);
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received. Stopping fleet...");
        },
    }

    let removed = fleet.send(StopFleet).await?;
    info!("Fleet stopped. {} bots disconnected", removed);
    server.handle().stop(true).await;
    Ok(())
}
