use actix::Message;

use crate::error::{ConfigurationError, FleetError};
use crate::fleet::FleetMetrics;
use crate::fleet_actor::{FleetStatus, TickReport};
use crate::movement::MovementPattern;

/// 이미 동작 중이면 false
#[derive(Message)]
#[rtype(result = "bool")]
pub struct StartFleet;

/// 정리된 봇 수를 돌려준다
#[derive(Message)]
#[rtype(result = "usize")]
pub struct StopFleet;

#[derive(Message)]
#[rtype(result = "Result<String, FleetError>")]
pub struct SpawnBot;

/// 없는 id 면 false
#[derive(Message)]
#[rtype(result = "bool")]
pub struct DespawnBot {
    pub id: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct SetPattern(pub MovementPattern);

#[derive(Message)]
#[rtype(result = "Result<(), ConfigurationError>")]
pub struct SetCapacity(pub i64);

#[derive(Message)]
#[rtype(result = "Result<(), ConfigurationError>")]
pub struct SetSpawnRate(pub i64);

#[derive(Message)]
#[rtype(result = "FleetMetrics")]
pub struct GetMetrics;

/// 오래된 스냅샷부터
#[derive(Message)]
#[rtype(result = "Vec<FleetMetrics>")]
pub struct GetHistory;

#[derive(Message)]
#[rtype(result = "FleetStatus")]
pub struct GetStatus;

/// 타이머를 기다리지 않고 컨트롤 틱을 한 번 실행한다. 멈춘 상태면 아무것도 하지 않는다.
#[derive(Message)]
#[rtype(result = "TickReport")]
pub struct ControlTick;
