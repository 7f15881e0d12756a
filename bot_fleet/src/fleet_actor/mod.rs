use std::collections::HashMap;
use std::sync::Arc;

use actix::fut::{self, ActorFutureExt};
use actix::{Actor, Addr, AsyncContext, Context, ResponseActFuture, SpawnHandle, WrapFuture};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::bot::{Bot, BotMetrics};
use crate::bot_actor::message::{GetBotMetrics, SetBotPattern, ShutdownBot};
use crate::bot_actor::BotActor;
use crate::clock::{Clock, SystemClock};
use crate::config::FleetConfig;
use crate::error::{FleetError, SessionError};
use crate::fleet::{
    aggregate, FleetMetrics, MetricsHistory, PatternCounts, ResourceProbe, ResourceUsage,
    ThresholdBreach,
};
use crate::movement::MovementPattern;
use crate::seed::bot_id_for;
use crate::session::SessionConnector;

pub mod handler;
pub mod message;

pub(crate) struct BotHandle {
    pub addr: Addr<BotActor>,
    pub pattern: MovementPattern,
}

/// 컨트롤 틱 한 번의 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    /// 이번 틱에 시작한 스폰 수 (완료 여부와 무관)
    pub spawned: usize,
    pub breaches: Vec<ThresholdBreach>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetStatus {
    pub running: bool,
    pub active_bots: usize,
    pub pending_spawns: usize,
    pub pattern_counts: PatternCounts,
    pub default_pattern: MovementPattern,
    pub capacity: usize,
    pub spawn_rate: usize,
    pub control_ticks: u64,
    pub threshold_shutdowns: u64,
}

/// FleetActor
///
/// ## 역할
/// 봇 집합을 유일하게 소유하고 변경하는 컨트롤러.
/// 1. `StartFleet` 이후 control interval 마다 용량 안에서 봇을 스폰한다.
/// 2. 각 `BotActor` 에서 측정값을 모아 `FleetMetrics` 를 만들고 히스토리에 쌓는다.
/// 3. 임계값을 하나라도 넘으면 fleet 전체를 멈춘다.
///
/// `stop` 은 generation 을 올린다. 그 전에 출발한 스폰과 집계는 완료 시점에 generation 을
/// 비교해서 버려진다.
pub struct FleetActor {
    pub(crate) config: FleetConfig,
    connector: Arc<dyn SessionConnector>,
    probe: Arc<dyn ResourceProbe>,
    clock: Arc<dyn Clock>,

    pub(crate) bots: HashMap<String, BotHandle>,
    pub(crate) pattern_counts: PatternCounts,
    pub(crate) pending_spawns: usize,
    next_index: u64,
    generation: u64,

    pub(crate) running: bool,
    control: Option<SpawnHandle>,

    pub(crate) metrics: FleetMetrics,
    pub(crate) history: MetricsHistory,
    last_usage: ResourceUsage,
    pub(crate) control_ticks: u64,
    pub(crate) threshold_shutdowns: u64,
}

impl FleetActor {
    pub fn new(
        config: FleetConfig,
        connector: Arc<dyn SessionConnector>,
        probe: Arc<dyn ResourceProbe>,
    ) -> Self {
        let history = MetricsHistory::new(config.history_limit);
        Self {
            config,
            connector,
            probe,
            clock: Arc::new(SystemClock::new()),
            bots: HashMap::new(),
            pattern_counts: PatternCounts::default(),
            pending_spawns: 0,
            next_index: 0,
            generation: 0,
            running: false,
            control: None,
            metrics: FleetMetrics::default(),
            history,
            last_usage: ResourceUsage::default(),
            control_ticks: 0,
            threshold_shutdowns: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn status(&self) -> FleetStatus {
        FleetStatus {
            running: self.running,
            active_bots: self.bots.len(),
            pending_spawns: self.pending_spawns,
            pattern_counts: self.pattern_counts.clone(),
            default_pattern: self.config.default_pattern,
            capacity: self.config.capacity,
            spawn_rate: self.config.spawn_rate,
            control_ticks: self.control_ticks,
            threshold_shutdowns: self.threshold_shutdowns,
        }
    }

    pub(crate) fn start_fleet(&mut self, ctx: &mut Context<Self>) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        let interval = self.config.control_interval;
        self.control = Some(ctx.run_interval(interval, |act, ctx| {
            let tick = act.control_tick(ctx).map(|_report, _act, _ctx| ());
            ctx.spawn(tick);
        }));
        info!(
            "Fleet started. capacity={}, spawn_rate={}, interval={:?}",
            self.config.capacity, self.config.spawn_rate, interval
        );
        true
    }

    /// 타이머 해제, 모든 봇 정리, 집계 초기화. 여러 번 불러도 결과는 같다.
    pub(crate) fn stop_fleet(&mut self, ctx: &mut Context<Self>) -> usize {
        if let Some(handle) = self.control.take() {
            ctx.cancel_future(handle);
        }
        let was_running = self.running;
        self.running = false;
        self.generation += 1;
        self.pending_spawns = 0;

        let removed = self.bots.len();
        for (_, handle) in self.bots.drain() {
            handle.addr.do_send(ShutdownBot);
        }
        self.pattern_counts = PatternCounts::default();
        self.metrics = FleetMetrics::default();
        fleet_metrics::record_snapshot(0, 0.0, 0.0, 0.0, 0.0, &self.pattern_labels());

        if was_running || removed > 0 {
            info!("Fleet stopped. {} bots disconnected", removed);
        }
        removed
    }

    /// 용량 확인 후 스폰 자리를 예약한다. 진행 중인 스폰도 자리를 차지한다.
    fn reserve_spawn(&mut self) -> Result<(), FleetError> {
        if self.bots.len() + self.pending_spawns >= self.config.capacity {
            return Err(FleetError::CapacityReached {
                capacity: self.config.capacity,
            });
        }
        self.pending_spawns += 1;
        Ok(())
    }

    pub(crate) fn spawn_bot(&mut self) -> ResponseActFuture<Self, Result<String, FleetError>> {
        if let Err(e) = self.reserve_spawn() {
            return Box::pin(fut::ready(Err(e)));
        }

        let id = bot_id_for(self.config.seed, self.next_index);
        self.next_index += 1;
        let mut bot = Bot::new(
            id,
            self.config.tick_frequency,
            self.config.default_pattern,
            self.config.movement,
            self.config.seed,
        );

        let generation = self.generation;
        let connector = self.connector.clone();
        let server_address = self.config.server_address.clone();
        let module = self.config.module.clone();

        let connect = async move {
            let result = bot
                .connect(connector.as_ref(), &server_address, &module)
                .await;
            (bot, result)
        }
        .into_actor(self)
        .map(move |(bot, result), act, _ctx| act.complete_spawn(generation, bot, result));

        Box::pin(connect)
    }

    fn complete_spawn(
        &mut self,
        generation: u64,
        mut bot: Bot,
        result: Result<(), SessionError>,
    ) -> Result<String, FleetError> {
        let id = bot.id().to_string();

        if generation != self.generation {
            // stop 이후에 끝난 스폰: 등록하지 않고 바로 끊는다
            bot.disconnect();
            debug!("[{}] late spawn discarded after stop", id);
            return Err(FleetError::Cancelled { id });
        }
        self.pending_spawns = self.pending_spawns.saturating_sub(1);

        if let Err(e) = result {
            fleet_metrics::BOT_SPAWN_FAILURES_TOTAL.inc();
            return Err(e.into());
        }

        // 연결이 끝난 시점의 기본 패턴을 적용한다
        let pattern = self.config.default_pattern;
        bot.set_pattern(pattern);
        let addr = BotActor::new(bot, self.clock.clone()).start();

        self.bots.insert(id.clone(), BotHandle { addr, pattern });
        self.pattern_counts.increment(pattern);
        info!("[{}] spawned ({} active)", id, self.bots.len());
        Ok(id)
    }

    pub(crate) fn despawn_bot(&mut self, id: &str) -> bool {
        match self.bots.remove(id) {
            Some(handle) => {
                self.pattern_counts.decrement(handle.pattern);
                handle.addr.do_send(ShutdownBot);
                info!("[{}] despawned ({} active)", id, self.bots.len());
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_pattern(&mut self, pattern: MovementPattern) {
        self.config.default_pattern = pattern;
        for handle in self.bots.values_mut() {
            handle.pattern = pattern;
            handle.addr.do_send(SetBotPattern(pattern));
        }
        self.pattern_counts = PatternCounts::all_in(pattern, self.bots.len());
        info!("Pattern set to {} for {} bots", pattern, self.bots.len());
    }

    /// 스폰 → 집계 → 임계값 검사
    pub(crate) fn control_tick(
        &mut self,
        ctx: &mut Context<Self>,
    ) -> ResponseActFuture<Self, TickReport> {
        if !self.running {
            return Box::pin(fut::ready(TickReport::default()));
        }
        self.control_ticks += 1;

        let mut spawned = 0;
        for _ in 0..self.config.spawn_rate {
            if self.bots.len() + self.pending_spawns >= self.config.capacity {
                break;
            }
            let spawn = self.spawn_bot().map(|result, _act, _ctx| match result {
                Ok(_) | Err(FleetError::Cancelled { .. }) => {}
                Err(e) => warn!("Bot spawn failed: {}", e),
            });
            ctx.spawn(spawn);
            spawned += 1;
        }

        let generation = self.generation;
        let addrs: Vec<Addr<BotActor>> = self.bots.values().map(|h| h.addr.clone()).collect();
        let probe = self.probe.clone();
        // 멈춘 probe 가 집계를 막지 않도록 control interval 안에서 끊는다
        let probe_timeout = self.config.probe_timeout.min(self.config.control_interval);

        let collect = async move {
            let replies = join_all(addrs.iter().map(|addr| addr.send(GetBotMetrics))).await;
            let usage = match timeout(probe_timeout, probe.sample()).await {
                Ok(usage) => usage,
                Err(_) => Err(anyhow::anyhow!("no sample within {:?}", probe_timeout)),
            };
            (replies, usage)
        }
        .into_actor(self)
        .map(move |(replies, usage), act, ctx| {
            if generation != act.generation {
                debug!("Aggregation discarded after stop");
                return TickReport {
                    spawned,
                    breaches: Vec::new(),
                };
            }

            let bot_metrics: Vec<BotMetrics> = replies.into_iter().filter_map(Result::ok).collect();
            let usage = match usage {
                Ok(usage) => {
                    act.last_usage = usage;
                    usage
                }
                Err(e) => {
                    warn!("Resource probe failed, reusing last sample: {}", e);
                    act.last_usage
                }
            };

            let breaches = act.apply_snapshot(&bot_metrics, usage);
            if !breaches.is_empty() {
                for breach in &breaches {
                    warn!("Threshold breached ({}): {}", breach.name(), breach);
                    fleet_metrics::THRESHOLD_SHUTDOWNS_TOTAL
                        .with_label_values(&[breach.name()])
                        .inc();
                }
                act.threshold_shutdowns += 1;
                act.stop_fleet(ctx);
            }

            TickReport { spawned, breaches }
        });

        Box::pin(collect)
    }

    fn apply_snapshot(
        &mut self,
        bot_metrics: &[BotMetrics],
        usage: ResourceUsage,
    ) -> Vec<ThresholdBreach> {
        let snapshot = aggregate(
            &self.metrics,
            self.bots.len(),
            bot_metrics,
            self.pattern_counts.clone(),
            usage,
        );
        fleet_metrics::record_snapshot(
            snapshot.active_bots,
            snapshot.average_latency_ms,
            snapshot.average_tick_rate,
            snapshot.memory_usage_mb,
            snapshot.cpu_usage_percent,
            &self.pattern_labels(),
        );
        debug!(
            "Fleet snapshot: bots={}, latency={:.2}ms, tick_rate={:.2}/s, memory={:.1}MB",
            snapshot.active_bots,
            snapshot.average_latency_ms,
            snapshot.average_tick_rate,
            snapshot.memory_usage_mb
        );

        self.history.push(snapshot.clone());
        self.metrics = snapshot;
        self.config.thresholds.evaluate(&self.metrics)
    }

    fn pattern_labels(&self) -> Vec<(&'static str, usize)> {
        self.pattern_counts
            .iter()
            .map(|(pattern, count)| (pattern.as_str(), count))
            .collect()
    }
}

impl Actor for FleetActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        info!(
            "FleetActor started. target={}/{}",
            self.config.server_address, self.config.module
        );
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.stop_fleet(ctx);
        info!("FleetActor stopped.");
    }
}
