use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use super::{Identity, Session, SessionConnector};
use crate::error::SessionError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

const MIN_PING_INTERVAL: Duration = Duration::from_millis(10);
/// Close 를 보낸 뒤 서버 응답을 기다리는 최대 시간
const CLOSE_GRACE: Duration = Duration::from_millis(500);

// --- 와이어 프레임 ---
#[derive(Serialize)]
#[serde(tag = "type")]
enum ClientFrame<'a> {
    #[serde(rename = "call")]
    Call {
        procedure: &'a str,
        args: serde_json::Value,
    },
}

#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
enum ServerFrame {
    #[serde(rename = "identity_token")]
    IdentityToken { identity: String },
    #[serde(other)]
    Other,
}

enum Outgoing {
    Text(String),
    Close,
}

/// WebSocket 기반 세션 커넥터.
///
/// `<server_address>/<module>` 로 접속하고, 서버가 보내는 `identity_token` 프레임을 받아야
/// 연결이 성립한다. 연결 후에는 주기적으로 ping 을 보내 왕복 지연을 잰다.
#[derive(Debug, Clone)]
pub struct WsConnector {
    pub connect_timeout: Duration,
    pub ping_interval: Duration,
}

impl WsConnector {
    pub fn new(connect_timeout: Duration, ping_interval: Duration) -> Self {
        Self {
            connect_timeout,
            ping_interval: ping_interval.max(MIN_PING_INTERVAL),
        }
    }
}

#[async_trait]
impl SessionConnector for WsConnector {
    async fn connect(
        &self,
        server_address: &str,
        module: &str,
    ) -> Result<(Identity, Box<dyn Session>), SessionError> {
        let url = Url::parse(&format!("{}/{}", server_address.trim_end_matches('/'), module))
            .map_err(|e| SessionError::Connection(format!("invalid url: {}", e)))?;

        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| {
                SessionError::Connection(format!("timed out after {:?}", self.connect_timeout))
            })?
            .map_err(|e| SessionError::Connection(e.to_string()))?;

        let (sink, mut stream) = ws_stream.split();

        let identity = tokio::time::timeout(self.connect_timeout, read_identity(&mut stream))
            .await
            .map_err(|_| SessionError::Connection("no identity_token received".to_string()))??;
        debug!("Session established for identity {}", identity);

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let round_trip = Arc::new(Mutex::new(None));
        let origin = Instant::now();
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(write_loop(
            sink,
            rx,
            self.ping_interval,
            origin,
            closed.clone(),
            shutdown.clone(),
        ));
        tokio::spawn(read_loop(
            stream,
            round_trip.clone(),
            origin,
            closed.clone(),
            shutdown,
        ));

        let session = WsSession {
            tx,
            round_trip,
            closed,
        };
        Ok((identity, Box::new(session)))
    }
}

async fn read_identity(stream: &mut WsStream) -> Result<Identity, SessionError> {
    while let Some(msg) = stream.next().await {
        match msg.map_err(|e| SessionError::Connection(e.to_string()))? {
            Message::Text(text) => {
                if let Ok(ServerFrame::IdentityToken { identity }) = serde_json::from_str(&text) {
                    return Ok(Identity(identity));
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    Err(SessionError::Connection(
        "connection closed before identity_token".to_string(),
    ))
}

async fn write_loop(
    mut sink: WsSink,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
    ping_interval: Duration,
    origin: Instant,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    let mut ping = tokio::time::interval(ping_interval);
    loop {
        let message = tokio::select! {
            outgoing = rx.recv() => match outgoing {
                Some(Outgoing::Text(text)) => Message::Text(text),
                Some(Outgoing::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                // payload: 보낸 시각 (origin 기준 µs)
                let sent_us = origin.elapsed().as_micros() as u64;
                Message::Ping(sent_us.to_le_bytes().to_vec())
            }
        };

        if let Err(e) = sink.send(message).await {
            warn!("Session write failed: {}", e);
            break;
        }
    }
    closed.store(true, Ordering::SeqCst);
    // 읽기 쪽도 내려야 소켓이 닫힌다
    shutdown.notify_one();
}

async fn read_loop(
    mut stream: WsStream,
    round_trip: Arc<Mutex<Option<f64>>>,
    origin: Instant,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    loop {
        let mut closing = false;
        let next = tokio::select! {
            msg = stream.next() => msg,
            _ = shutdown.notified() => {
                closing = true;
                None
            }
        };
        if closing {
            // 응답 없는 서버라면 grace 이후 그냥 끊는다
            let _ = tokio::time::timeout(CLOSE_GRACE, drain_until_close(&mut stream)).await;
            break;
        }
        let Some(msg) = next else {
            break;
        };

        match msg {
            Ok(Message::Pong(payload)) => {
                if let Ok(bytes) = <[u8; 8]>::try_from(payload.as_slice()) {
                    let sent_us = u64::from_le_bytes(bytes);
                    let now_us = origin.elapsed().as_micros() as u64;
                    *round_trip.lock() = Some(now_us.saturating_sub(sent_us) as f64 / 1000.0);
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!("Session read ended: {}", e);
                break;
            }
            Ok(_) => {}
        }
    }
    closed.store(true, Ordering::SeqCst);
}

async fn drain_until_close(stream: &mut WsStream) {
    while let Some(Ok(msg)) = stream.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }
}

pub struct WsSession {
    tx: mpsc::UnboundedSender<Outgoing>,
    round_trip: Arc<Mutex<Option<f64>>>,
    closed: Arc<AtomicBool>,
}

impl Session for WsSession {
    fn invoke(&self, procedure: &str, args: serde_json::Value) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::invocation(procedure, "session closed"));
        }
        let text = serde_json::to_string(&ClientFrame::Call { procedure, args })
            .map_err(|e| SessionError::invocation(procedure, e.to_string()))?;
        self.tx
            .send(Outgoing::Text(text))
            .map_err(|_| SessionError::invocation(procedure, "session closed"))
    }

    fn round_trip_ms(&self) -> Option<f64> {
        *self.round_trip.lock()
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(Outgoing::Close);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_frame_shape() {
        let frame = ClientFrame::Call {
            procedure: "update_input",
            args: serde_json::json!({ "status": "idle" }),
        };
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "call");
        assert_eq!(value["procedure"], "update_input");
        assert_eq!(value["args"]["status"], "idle");
    }

    #[test]
    fn test_identity_frame_parsing() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"type":"identity_token","identity":"abc"}"#).unwrap();
        assert!(matches!(frame, ServerFrame::IdentityToken { identity } if identity == "abc"));

        let other: ServerFrame = serde_json::from_str(r#"{"type":"chat"}"#).unwrap();
        assert!(matches!(other, ServerFrame::Other));
    }

    #[actix_web::test]
    async fn test_unreachable_server_is_a_connection_error() {
        let connector = WsConnector::new(Duration::from_millis(500), Duration::from_secs(1));
        let result = connector.connect("ws://127.0.0.1:1", "game").await;
        assert!(matches!(result, Err(SessionError::Connection(_))));
    }

    #[actix_web::test]
    async fn test_close_releases_socket_when_server_stays_silent() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text(
                r#"{"type":"identity_token","identity":"silent"}"#.to_string(),
            ))
            .await
            .unwrap();

            // Close 에 응답하지 않도록 websocket 계층을 건너뛰고 소켓만 읽는다
            let mut buf = [0u8; 256];
            loop {
                match ws.get_mut().read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        let connector = WsConnector::new(Duration::from_secs(2), Duration::from_secs(10));
        let (identity, session) = connector
            .connect(&format!("ws://127.0.0.1:{}", port), "game")
            .await
            .unwrap();
        assert_eq!(identity, Identity("silent".to_string()));

        session.close();
        // 클라이언트가 소켓을 놓아야 서버 쪽 read 가 EOF 를 본다
        let released = tokio::time::timeout(Duration::from_secs(3), server).await;
        assert!(released.is_ok());
    }

    #[test]
    fn test_closed_session_rejects_invoke() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = WsSession {
            tx,
            round_trip: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicBool::new(false)),
        };
        assert!(session.invoke("update_input", serde_json::json!({})).is_ok());

        session.close();
        session.close();
        assert!(matches!(
            session.invoke("update_input", serde_json::json!({})),
            Err(SessionError::Invocation { .. })
        ));
        assert_eq!(session.round_trip_ms(), None);
    }
}
