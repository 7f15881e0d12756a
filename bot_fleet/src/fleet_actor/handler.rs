use actix::{Handler, MessageResult, ResponseActFuture};
use tracing::info;

use crate::config::positive;
use crate::error::{ConfigurationError, FleetError};
use crate::fleet_actor::{
    message::{
        ControlTick, DespawnBot, GetHistory, GetMetrics, GetStatus, SetCapacity, SetPattern,
        SetSpawnRate, SpawnBot, StartFleet, StopFleet,
    },
    FleetActor, TickReport,
};

impl Handler<StartFleet> for FleetActor {
    type Result = bool;

    fn handle(&mut self, _msg: StartFleet, ctx: &mut Self::Context) -> Self::Result {
        self.start_fleet(ctx)
    }
}

impl Handler<StopFleet> for FleetActor {
    type Result = usize;

    fn handle(&mut self, _msg: StopFleet, ctx: &mut Self::Context) -> Self::Result {
        self.stop_fleet(ctx)
    }
}

impl Handler<SpawnBot> for FleetActor {
    type Result = ResponseActFuture<Self, Result<String, FleetError>>;

    fn handle(&mut self, _msg: SpawnBot, _ctx: &mut Self::Context) -> Self::Result {
        self.spawn_bot()
    }
}

impl Handler<DespawnBot> for FleetActor {
    type Result = bool;

    fn handle(&mut self, msg: DespawnBot, _ctx: &mut Self::Context) -> Self::Result {
        self.despawn_bot(&msg.id)
    }
}

impl Handler<SetPattern> for FleetActor {
    type Result = ();

    fn handle(&mut self, msg: SetPattern, _ctx: &mut Self::Context) -> Self::Result {
        self.set_pattern(msg.0);
    }
}

impl Handler<SetCapacity> for FleetActor {
    type Result = Result<(), ConfigurationError>;

    fn handle(&mut self, msg: SetCapacity, _ctx: &mut Self::Context) -> Self::Result {
        let capacity = positive("capacity", msg.0)? as usize;
        // 줄여도 이미 있는 봇은 유지된다. 새 스폰만 막힌다.
        self.config.capacity = capacity;
        info!("Capacity set to {}", capacity);
        Ok(())
    }
}

impl Handler<SetSpawnRate> for FleetActor {
    type Result = Result<(), ConfigurationError>;

    fn handle(&mut self, msg: SetSpawnRate, _ctx: &mut Self::Context) -> Self::Result {
        let spawn_rate = positive("spawn_rate", msg.0)? as usize;
        self.config.spawn_rate = spawn_rate;
        info!("Spawn rate set to {}", spawn_rate);
        Ok(())
    }
}

impl Handler<GetMetrics> for FleetActor {
    type Result = MessageResult<GetMetrics>;

    fn handle(&mut self, _msg: GetMetrics, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.metrics.clone())
    }
}

impl Handler<GetHistory> for FleetActor {
    type Result = MessageResult<GetHistory>;

    fn handle(&mut self, _msg: GetHistory, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.history.to_vec())
    }
}

impl Handler<GetStatus> for FleetActor {
    type Result = MessageResult<GetStatus>;

    fn handle(&mut self, _msg: GetStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.status())
    }
}

impl Handler<ControlTick> for FleetActor {
    type Result = ResponseActFuture<Self, TickReport>;

    fn handle(&mut self, _msg: ControlTick, ctx: &mut Self::Context) -> Self::Result {
        self.control_tick(ctx)
    }
}
