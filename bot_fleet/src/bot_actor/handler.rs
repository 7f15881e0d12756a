use actix::{ActorContext, Handler, MessageResult};

use crate::bot_actor::{
    message::{GetBotMetrics, SetBotPattern, ShutdownBot},
    BotActor,
};

impl Handler<GetBotMetrics> for BotActor {
    type Result = MessageResult<GetBotMetrics>;

    fn handle(&mut self, _msg: GetBotMetrics, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(self.bot.metrics_snapshot())
    }
}

impl Handler<SetBotPattern> for BotActor {
    type Result = ();

    fn handle(&mut self, msg: SetBotPattern, _ctx: &mut Self::Context) -> Self::Result {
        self.bot.set_pattern(msg.0);
    }
}

impl Handler<ShutdownBot> for BotActor {
    type Result = ();

    fn handle(&mut self, _msg: ShutdownBot, ctx: &mut Self::Context) -> Self::Result {
        self.bot.disconnect();
        ctx.stop();
    }
}
