use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SessionError;
use crate::fleet::resource::{ResourceProbe, ResourceUsage};
use crate::session::{Identity, Session, SessionConnector};

#[derive(Default)]
struct MockState {
    fail_connect: AtomicBool,
    fail_invoke: AtomicBool,
    latency_ms: Mutex<Option<f64>>,
    connect_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<(String, serde_json::Value)>>,
    connects: AtomicU64,
    closed: AtomicUsize,
}

/// 실제 서버 없이 세션을 흉내내는 커넥터.
///
/// 커넥터와 그것이 만든 세션들은 상태를 공유하므로, 연결 후에도 실패 여부나 지연을
/// 바꿀 수 있다.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_connect(self) -> Self {
        self.state.fail_connect.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_invoke(self) -> Self {
        self.set_invoke_failure(true);
        self
    }

    pub fn with_latency(self, latency_ms: f64) -> Self {
        self.set_latency(Some(latency_ms));
        self
    }

    /// connect 가 완료되기 전에 기다리는 시간
    pub fn with_connect_delay(self, delay: Duration) -> Self {
        *self.state.connect_delay.lock() = Some(delay);
        self
    }

    pub fn set_invoke_failure(&self, fail: bool) {
        self.state.fail_invoke.store(fail, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency_ms: Option<f64>) {
        *self.state.latency_ms.lock() = latency_ms;
    }

    pub fn calls(&self) -> Vec<(String, serde_json::Value)> {
        self.state.calls.lock().clone()
    }

    pub fn calls_to(&self, procedure: &str) -> usize {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|(p, _)| p == procedure)
            .count()
    }

    pub fn connects(&self) -> u64 {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn closed_sessions(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(
        &self,
        server_address: &str,
        _module: &str,
    ) -> Result<(Identity, Box<dyn Session>), SessionError> {
        let delay = *self.state.connect_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(SessionError::Connection(format!(
                "{} refused the connection",
                server_address
            )));
        }

        let n = self.state.connects.fetch_add(1, Ordering::SeqCst);
        let session = MockSession {
            state: self.state.clone(),
            closed: AtomicBool::new(false),
        };
        Ok((Identity(format!("mock-identity-{}", n)), Box::new(session)))
    }
}

pub struct MockSession {
    state: Arc<MockState>,
    closed: AtomicBool,
}

impl Session for MockSession {
    fn invoke(&self, procedure: &str, args: serde_json::Value) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::invocation(procedure, "session closed"));
        }
        if self.state.fail_invoke.load(Ordering::SeqCst) {
            return Err(SessionError::invocation(procedure, "mock failure"));
        }
        self.state.calls.lock().push((procedure.to_string(), args));
        Ok(())
    }

    fn round_trip_ms(&self) -> Option<f64> {
        *self.state.latency_ms.lock()
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// 고정된 값을 돌려주는 probe. 실패나 무응답으로 바꿔 둘 수도 있다.
#[derive(Clone, Default)]
pub struct StaticProbe {
    usage: Arc<Mutex<ResourceUsage>>,
    failing: Arc<AtomicBool>,
    hanging: Arc<AtomicBool>,
}

impl StaticProbe {
    pub fn new(memory_mb: f64, cpu_percent: f64) -> Self {
        let probe = Self::default();
        probe.set(memory_mb, cpu_percent);
        probe
    }

    pub fn set(&self, memory_mb: f64, cpu_percent: f64) {
        *self.usage.lock() = ResourceUsage {
            memory_mb,
            cpu_percent,
        };
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 이후의 sample 은 끝나지 않는다
    pub fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceProbe for StaticProbe {
    async fn sample(&self) -> anyhow::Result<ResourceUsage> {
        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("probe unavailable");
        }
        Ok(*self.usage.lock())
    }
}
