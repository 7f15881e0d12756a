use actix::Message;

use crate::bot::BotMetrics;
use crate::movement::MovementPattern;

#[derive(Message)]
#[rtype(result = "BotMetrics")]
pub struct GetBotMetrics;

#[derive(Message)]
#[rtype(result = "()")]
pub struct SetBotPattern(pub MovementPattern);

/// 세션을 닫고 액터를 멈춘다
#[derive(Message)]
#[rtype(result = "()")]
pub struct ShutdownBot;
