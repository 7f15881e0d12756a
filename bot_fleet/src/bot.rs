use std::time::{Duration, Instant};

use rand::Rng;
use rand_chacha::ChaCha20Rng;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::SessionError;
use crate::movement::{
    InputSample, MovementPattern, MovementSettings, MovementSimulator, PatternState, Pose,
};
use crate::seed::rng_for;
use crate::session::{Identity, Session, SessionConnector};

pub const REGISTER_PROCEDURE: &str = "register_entity";
pub const UPDATE_INPUT_PROCEDURE: &str = "update_input";
pub const DEFAULT_CHARACTER_CLASS: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BotState {
    Disconnected,
    Connected,
}

/// 봇 자신의 업데이트 주기 측정값
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BotMetrics {
    pub last_update_ms: f64,
    pub update_count: u64,
    pub average_update_ms: f64,
    /// 세션이 측정한 왕복 지연. 측정된 적 없으면 None.
    pub latency_ms: Option<f64>,
    pub failed_updates: u64,
}

impl BotMetrics {
    /// 온라인 평균: newAvg = (oldAvg * (n - 1) + latest) / n
    pub fn record_update(&mut self, elapsed_ms: f64) {
        self.update_count += 1;
        let n = self.update_count as f64;
        self.average_update_ms = (self.average_update_ms * (n - 1.0) + elapsed_ms) / n;
        self.last_update_ms = elapsed_ms;
    }

    /// 1000 / 평균 업데이트 시간. 아직 업데이트가 없으면 None.
    pub fn tick_rate(&self) -> Option<f64> {
        if self.update_count == 0 || self.average_update_ms <= 0.0 {
            None
        } else {
            Some(1000.0 / self.average_update_ms)
        }
    }
}

/// One simulated client.
///
/// A bot is created disconnected. [`Bot::connect`] opens a session and registers the
/// entity; only then does [`Bot::tick`] start producing input updates.
pub struct Bot {
    id: String,
    tick_frequency: u32,
    pattern: MovementPattern,
    pattern_state: PatternState,
    pose: Pose,
    input: InputSample,
    simulator: MovementSimulator,
    metrics: BotMetrics,
    color: [u8; 3],
    session: Option<Box<dyn Session>>,
    identity: Option<Identity>,
    last_tick_ms: Option<u64>,
}

impl Bot {
    pub fn new(
        id: impl Into<String>,
        tick_frequency: u32,
        pattern: MovementPattern,
        movement: MovementSettings,
        fleet_seed: u64,
    ) -> Self {
        let id = id.into();
        let mut color_rng: ChaCha20Rng = rng_for(fleet_seed, &format!("bot/{}/color", id));
        let color = [color_rng.gen(), color_rng.gen(), color_rng.gen()];
        let simulator = MovementSimulator::new(
            movement,
            rng_for(fleet_seed, &format!("bot/{}/movement", id)),
        );

        Self {
            id,
            tick_frequency: tick_frequency.max(1),
            pattern,
            pattern_state: PatternState::default(),
            pose: Pose::default(),
            input: InputSample::default(),
            simulator,
            metrics: BotMetrics::default(),
            color,
            session: None,
            identity: None,
            last_tick_ms: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> String {
        format!("Bot-{}", self.id.chars().take(8).collect::<String>())
    }

    pub fn state(&self) -> BotState {
        if self.session.is_some() {
            BotState::Connected
        } else {
            BotState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn pattern(&self) -> MovementPattern {
        self.pattern
    }

    pub fn pattern_state(&self) -> &PatternState {
        &self.pattern_state
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn input(&self) -> &InputSample {
        &self.input
    }

    pub fn tick_frequency(&self) -> u32 {
        self.tick_frequency
    }

    /// 1 / tick_frequency 초. ms 로 나누어떨어지지 않아도 잘리지 않는다.
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(1) / self.tick_frequency
    }

    /// 세션 연결 후 엔티티 등록까지 성공해야 connected 상태가 된다.
    /// 실패하면 아무 상태도 남기지 않는다.
    pub async fn connect(
        &mut self,
        connector: &dyn SessionConnector,
        server_address: &str,
        module: &str,
    ) -> Result<(), SessionError> {
        self.disconnect();

        let (identity, session) = connector.connect(server_address, module).await?;

        let registration = json!([self.display_name(), DEFAULT_CHARACTER_CLASS, self.color]);
        if let Err(e) = session.invoke(REGISTER_PROCEDURE, registration) {
            session.close();
            return Err(e);
        }

        info!("[{}] connected as {}", self.id, identity);
        self.identity = Some(identity);
        self.session = Some(session);
        // 재연결 시에만 시퀀스를 되돌린다
        self.input = InputSample::default();
        self.last_tick_ms = None;
        Ok(())
    }

    /// 패턴만 교체하고 패턴 상태(각도, 커서, 타이머)는 그대로 이어간다.
    pub fn set_pattern(&mut self, pattern: MovementPattern) {
        self.pattern = pattern;
    }

    /// Runs one simulation step if connected and the tick interval has elapsed.
    ///
    /// Returns `Ok(true)` when the tick fired. Local timing is recorded even if the
    /// remote update fails; the failure is returned afterwards.
    pub fn tick(&mut self, now_ms: u64) -> Result<bool, SessionError> {
        let Some(session) = self.session.as_ref() else {
            return Ok(false);
        };
        if let Some(last) = self.last_tick_ms {
            // elapsed >= 1000 / f 를 정수로 비교: elapsed * f >= 1000
            let elapsed = now_ms.saturating_sub(last);
            if elapsed.saturating_mul(u64::from(self.tick_frequency)) < 1000 {
                return Ok(false);
            }
        }

        let started = Instant::now();
        self.last_tick_ms = Some(now_ms);

        self.simulator.step(
            self.pattern,
            &mut self.pattern_state,
            &mut self.pose,
            &mut self.input,
            now_ms,
        );

        let status = if self.input.forward { "moving" } else { "idle" };
        let update = json!({
            "input": self.input,
            "position": self.pose.position,
            "rotation": self.pose.rotation,
            "status": status,
        });
        let result = session.invoke(UPDATE_INPUT_PROCEDURE, update);

        self.metrics
            .record_update(started.elapsed().as_secs_f64() * 1000.0);
        self.metrics.latency_ms = session.round_trip_ms();

        match result {
            Ok(()) => Ok(true),
            Err(e) => {
                self.metrics.failed_updates += 1;
                Err(e)
            }
        }
    }

    pub fn metrics_snapshot(&self) -> BotMetrics {
        self.metrics.clone()
    }

    pub fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
            debug!("[{}] disconnected", self.id);
        }
        self.identity = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockConnector;

    fn bot(pattern: MovementPattern) -> Bot {
        Bot::new("bot-under-test", 60, pattern, MovementSettings::default(), 42)
    }

    #[test]
    fn test_online_mean_matches_arithmetic_mean() {
        let mut metrics = BotMetrics::default();
        for d in [2.0, 4.0, 6.0] {
            metrics.record_update(d);
        }
        assert_eq!(metrics.update_count, 3);
        assert!((metrics.average_update_ms - 4.0).abs() < 1e-9);
        assert_eq!(metrics.last_update_ms, 6.0);
        assert!((metrics.tick_rate().unwrap() - 250.0).abs() < 1e-9);

        let samples = [0.3, 1.7, 12.5, 0.01, 8.0, 3.3];
        let mut metrics = BotMetrics::default();
        for d in samples {
            metrics.record_update(d);
        }
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((metrics.average_update_ms - mean).abs() < 1e-9);
    }

    #[test]
    fn test_tick_is_noop_while_disconnected() {
        let mut bot = bot(MovementPattern::Circle);
        assert_eq!(bot.tick(0), Ok(false));
        assert_eq!(bot.tick(1_000), Ok(false));
        assert_eq!(bot.metrics_snapshot().update_count, 0);
        assert_eq!(bot.state(), BotState::Disconnected);
    }

    #[actix_web::test]
    async fn test_connect_registers_entity() {
        let connector = MockConnector::new();
        let mut bot = bot(MovementPattern::Circle);

        bot.connect(&connector, "ws://127.0.0.1:3000", "game")
            .await
            .unwrap();

        assert!(bot.is_connected());
        assert!(bot.identity().is_some());
        let calls = connector.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, REGISTER_PROCEDURE);
        assert_eq!(calls[0].1[0], "Bot-bot-unde");
        assert_eq!(calls[0].1[1], DEFAULT_CHARACTER_CLASS);
        assert_eq!(calls[0].1[2].as_array().map(|c| c.len()), Some(3));
    }

    #[actix_web::test]
    async fn test_failed_connect_leaves_bot_disconnected() {
        let connector = MockConnector::new().failing_connect();
        let mut bot = bot(MovementPattern::Grid);

        let result = bot.connect(&connector, "ws://127.0.0.1:3000", "game").await;
        assert!(matches!(result, Err(SessionError::Connection(_))));
        assert!(!bot.is_connected());
        assert!(bot.identity().is_none());
    }

    #[actix_web::test]
    async fn test_failed_registration_closes_session() {
        let connector = MockConnector::new().failing_invoke();
        let mut bot = bot(MovementPattern::Grid);

        let result = bot.connect(&connector, "ws://127.0.0.1:3000", "game").await;
        assert!(matches!(result, Err(SessionError::Invocation { .. })));
        assert!(!bot.is_connected());
        assert_eq!(connector.closed_sessions(), 1);
    }

    #[actix_web::test]
    async fn test_tick_gate_never_fires_early() {
        let connector = MockConnector::new();
        let mut bot = bot(MovementPattern::Circle);
        bot.connect(&connector, "ws://x", "game").await.unwrap();

        // 60Hz → 16.67ms 간격. 16ms 에서는 아직 이르다
        assert_eq!(bot.tick(1_000), Ok(true));
        assert_eq!(bot.tick(1_010), Ok(false));
        assert_eq!(bot.tick(1_016), Ok(false));
        assert_eq!(bot.tick(1_017), Ok(true));
        // 건너뛴 틱을 몰아서 실행하지 않는다
        assert_eq!(bot.tick(2_000), Ok(true));
        assert_eq!(bot.tick(2_001), Ok(false));
        assert_eq!(bot.metrics_snapshot().update_count, 3);
    }

    #[actix_web::test]
    async fn test_tick_gate_with_uneven_and_high_frequencies() {
        let connector = MockConnector::new();

        // 7Hz → 142.86ms
        let mut bot = Bot::new(
            "seven",
            7,
            MovementPattern::Grid,
            MovementSettings::default(),
            1,
        );
        bot.connect(&connector, "ws://x", "game").await.unwrap();
        assert_eq!(bot.tick(0), Ok(true));
        assert_eq!(bot.tick(142), Ok(false));
        assert_eq!(bot.tick(143), Ok(true));
        assert_eq!(bot.tick_period(), Duration::from_nanos(142_857_142));

        // 1000Hz 를 넘어도 같은 ms 안에서 두 번 발화하지 않는다
        let mut bot = Bot::new(
            "fast",
            2_000,
            MovementPattern::Circle,
            MovementSettings::default(),
            1,
        );
        bot.connect(&connector, "ws://x", "game").await.unwrap();
        assert_eq!(bot.tick(500), Ok(true));
        assert_eq!(bot.tick(500), Ok(false));
        assert_eq!(bot.tick(501), Ok(true));
        assert_eq!(bot.tick_period(), Duration::from_micros(500));
    }

    #[actix_web::test]
    async fn test_sequence_strictly_increases_across_ticks() {
        let connector = MockConnector::new();
        for pattern in [MovementPattern::Circle, MovementPattern::Grid] {
            let mut bot = bot(pattern);
            bot.connect(&connector, "ws://x", "game").await.unwrap();

            let mut last = bot.input().sequence;
            let mut now = 0;
            for step in 0..200u64 {
                // 간격이 들쭉날쭉해도 순서는 유지된다
                now += 5 + (step * 7) % 23;
                if bot.tick(now).unwrap() {
                    assert!(bot.input().sequence > last);
                }
                assert!(bot.input().sequence >= last);
                last = bot.input().sequence;
            }
        }
    }

    #[actix_web::test]
    async fn test_update_carries_status_label() {
        let connector = MockConnector::new();
        let mut bot = bot(MovementPattern::Grid);
        bot.connect(&connector, "ws://x", "game").await.unwrap();
        bot.tick(0).unwrap();

        let calls = connector.calls();
        let (procedure, args) = calls.last().unwrap();
        assert_eq!(procedure, UPDATE_INPUT_PROCEDURE);
        assert_eq!(args["status"], "moving");
        assert_eq!(args["input"]["sequence"], 1);
        assert!(args["position"].get("x").is_some());
    }

    #[actix_web::test]
    async fn test_failed_update_still_records_timing() {
        let connector = MockConnector::new().with_latency(12.5);
        let mut bot = bot(MovementPattern::Circle);
        bot.connect(&connector, "ws://x", "game").await.unwrap();

        connector.set_invoke_failure(true);
        let result = bot.tick(0);
        assert!(matches!(result, Err(SessionError::Invocation { .. })));

        let metrics = bot.metrics_snapshot();
        assert_eq!(metrics.update_count, 1);
        assert_eq!(metrics.failed_updates, 1);
        assert_eq!(metrics.latency_ms, Some(12.5));
    }

    #[actix_web::test]
    async fn test_disconnect_is_idempotent() {
        let connector = MockConnector::new();
        let mut bot = bot(MovementPattern::Random);
        bot.connect(&connector, "ws://x", "game").await.unwrap();

        bot.disconnect();
        bot.disconnect();
        assert!(!bot.is_connected());
        assert_eq!(connector.closed_sessions(), 1);
        assert_eq!(bot.tick(10_000), Ok(false));
    }

    #[actix_web::test]
    async fn test_pattern_switch_keeps_pattern_state() {
        let connector = MockConnector::new();
        let mut bot = bot(MovementPattern::Circle);
        bot.connect(&connector, "ws://x", "game").await.unwrap();

        for i in 0..5 {
            bot.tick(i * 100).unwrap();
        }
        let angle = bot.pattern_state().angle;

        bot.set_pattern(MovementPattern::Grid);
        bot.tick(1_000).unwrap();
        bot.set_pattern(MovementPattern::Circle);
        bot.tick(2_000).unwrap();

        assert!((bot.pattern_state().angle - (angle + 0.02)).abs() < 1e-6);
    }

    #[actix_web::test]
    async fn test_reconnect_resets_sequence() {
        let connector = MockConnector::new();
        let mut bot = bot(MovementPattern::Circle);
        bot.connect(&connector, "ws://x", "game").await.unwrap();
        bot.tick(0).unwrap();
        bot.tick(100).unwrap();
        assert_eq!(bot.input().sequence, 2);

        bot.connect(&connector, "ws://x", "game").await.unwrap();
        assert_eq!(bot.input().sequence, 0);
        assert_eq!(connector.closed_sessions(), 1);
    }
}
