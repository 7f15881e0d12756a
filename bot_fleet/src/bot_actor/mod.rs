use std::sync::Arc;
use std::time::Duration;

use actix::{Actor, AsyncContext, Context};
use tracing::{debug, warn};

use crate::bot::Bot;
use crate::clock::Clock;

pub mod handler;
pub mod message;

/// BotActor
///
/// ## 역할
/// 연결이 끝난 `Bot` 하나를 소유하고 자체 타이머로 틱을 돌린다.
/// 1. 틱 주기의 절반 간격으로 깨어나 `Bot::tick` 을 호출한다. 실제 발화 여부는 봇이 판단한다.
/// 2. 원격 호출 실패는 연속 실패 구간마다 한 번만 경고한다.
/// 3. fleet 은 메시지(`GetBotMetrics`)로만 봇 측정값을 읽는다.
pub struct BotActor {
    pub bot: Bot,
    clock: Arc<dyn Clock>,
    failing: bool,
}

impl BotActor {
    pub fn new(bot: Bot, clock: Arc<dyn Clock>) -> Self {
        Self {
            bot,
            clock,
            failing: false,
        }
    }

    fn poll_interval(&self) -> Duration {
        (self.bot.tick_period() / 2).max(Duration::from_millis(1))
    }

    fn on_tick(&mut self) {
        match self.bot.tick(self.clock.now_ms()) {
            Ok(_) => {
                if self.failing {
                    debug!("[{}] updates recovered", self.bot.id());
                    self.failing = false;
                }
            }
            Err(e) => {
                if !self.failing {
                    warn!("[{}] update failed: {}", self.bot.id(), e);
                    self.failing = true;
                }
            }
        }
    }
}

impl Actor for BotActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        debug!(
            "[{}] BotActor started. pattern={}, tick={}Hz",
            self.bot.id(),
            self.bot.pattern(),
            self.bot.tick_frequency()
        );
        ctx.run_interval(self.poll_interval(), |act, _ctx| act.on_tick());
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.bot.disconnect();
        debug!("[{}] BotActor stopped.", self.bot.id());
    }
}
