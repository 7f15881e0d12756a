pub mod bot;
pub mod bot_actor;
pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod fleet;
pub mod fleet_actor;
pub mod movement;
pub mod seed;
pub mod session;
pub mod test_utils;

use std::io;

use fleet_env::LoggingSettings;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::FleetConfig;
pub use error::{ConfigurationError, FleetError, SessionError};
pub use fleet_actor::FleetActor;
pub use movement::MovementPattern;

// --- 로거 설정 ---
// 반환된 guard 가 살아 있는 동안만 파일 로그가 flush 된다.
pub fn setup_logger(logging: &LoggingSettings) -> WorkerGuard {
    let file_appender =
        RollingFileAppender::new(Rotation::DAILY, &logging.directory, &logging.filename);
    let (non_blocking_file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG 가 있으면 설정값보다 우선
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let console_layer = fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .pretty();

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file_writer)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .pretty();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        "Logger initialized. Log file: {}/{}",
        logging.directory, logging.filename
    );
    guard
}
