use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

pub mod ws;

pub use ws::WsConnector;

/// 서버가 인증 후 돌려주는 식별자
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An established connection to the backend.
///
/// `invoke` is fire-and-forget: it only fails when the session is already closed.
pub trait Session: Send + Sync {
    fn invoke(&self, procedure: &str, args: serde_json::Value) -> Result<(), SessionError>;

    /// 마지막으로 측정한 왕복 지연. 측정 수단이 없으면 None.
    fn round_trip_ms(&self) -> Option<f64> {
        None
    }

    fn close(&self);
}

#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn connect(
        &self,
        server_address: &str,
        module: &str,
    ) -> Result<(Identity, Box<dyn Session>), SessionError>;
}
