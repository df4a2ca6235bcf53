//! CDP WebSocket connection
//!
//! One WebSocket to one DevTools target. Commands are matched to responses
//! through a pending-command map keyed by request id; a dedicated reader
//! task owns the receive half of the socket and completes the waiting
//! oneshot when the matching response arrives.

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::types::{CdpNotification, CdpRequest, CdpRpcResponse};
use crate::{Error, Result};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpRpcResponse>>>>;

/// Per-command timeout table
///
/// Screenshots and navigations legitimately take longer than ordinary
/// protocol calls.
#[derive(Debug, Clone)]
struct TimeoutTable {
    default_secs: u64,
    screenshot_secs: u64,
    navigation_secs: u64,
}

impl Default for TimeoutTable {
    fn default() -> Self {
        Self {
            default_secs: 30,
            screenshot_secs: 90,
            navigation_secs: 60,
        }
    }
}

impl TimeoutTable {
    fn for_method(&self, method: &str) -> tokio::time::Duration {
        let method = method.to_ascii_lowercase();
        let secs = if method.contains("screenshot") || method.contains("capture") {
            self.screenshot_secs
        } else if method.contains("navigate") || method.contains("reload") {
            self.navigation_secs
        } else {
            self.default_secs
        };
        tokio::time::Duration::from_secs(secs)
    }
}

/// WebSocket connection to one CDP target
#[derive(Debug)]
pub struct CdpConnection {
    url: String,
    sink: Mutex<WsSink>,
    pending: PendingMap,
    next_id: AtomicU64,
    active: Arc<AtomicBool>,
    timeouts: TimeoutTable,
}

impl CdpConnection {
    /// Connect to a DevTools target WebSocket
    ///
    /// # Arguments
    /// * `url` - target URL (e.g., "ws://localhost:9222/devtools/page/ABC123")
    pub async fn connect<S: Into<String>>(url: S) -> Result<Arc<Self>> {
        let url = url.into();
        info!("Connecting to CDP target {}", url);

        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::websocket(format!("Failed to connect to {}: {}", url, e)))?;
        let (sink, source) = stream.split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let active = Arc::new(AtomicBool::new(true));

        let connection = Arc::new(Self {
            url,
            sink: Mutex::new(sink),
            pending: Arc::clone(&pending),
            next_id: AtomicU64::new(1),
            active: Arc::clone(&active),
            timeouts: TimeoutTable::default(),
        });

        tokio::spawn(read_loop(source, pending, active));

        Ok(connection)
    }

    /// Target URL this connection is attached to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send a CDP command and wait for its response
    ///
    /// A protocol-level error in the response is surfaced as the call's
    /// failure, carrying the callee's own message.
    pub async fn send_command(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value> {
        if !self.is_active() {
            return Err(Error::websocket("Connection is not active"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CdpRequest {
            id,
            method: method.to_string(),
            params: if params.is_null() { None } else { Some(params) },
        };
        let json = serde_json::to_string(&request)
            .map_err(|e| Error::cdp(format!("Failed to serialize request: {}", e)))?;

        debug!("Sending CDP command {} {}", id, method);

        let (sender, receiver) = oneshot::channel();
        self.pending.lock().await.insert(id, sender);

        {
            let mut sink = self.sink.lock().await;
            if let Err(e) = sink.send(Message::Text(json)).await {
                self.pending.lock().await.remove(&id);
                return Err(Error::websocket(format!("Failed to send command: {}", e)));
            }
        }

        let timeout = self.timeouts.for_method(method);
        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => {
                if let Some(error) = response.error {
                    return Err(Error::cdp(format!(
                        "{} failed: {} (code {})",
                        method, error.message, error.code
                    )));
                }
                Ok(response.result)
            }
            Ok(Err(_)) => Err(Error::websocket(format!(
                "Connection dropped while awaiting {}",
                method
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::timeout(format!(
                    "{} got no response within {:?}",
                    method, timeout
                )))
            }
        }
    }

    /// Close the connection
    pub async fn close(&self) -> Result<()> {
        info!("Closing CDP connection to {}", self.url);
        self.active.store(false, Ordering::SeqCst);

        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!("Close frame not delivered: {}", e);
        }
        Ok(())
    }

    /// Check if the connection is active
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Reader task: complete pending commands, log events, stop on close
async fn read_loop(mut source: WsSource, pending: PendingMap, active: Arc<AtomicBool>) {
    while active.load(Ordering::SeqCst) {
        let message = match source.next().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                error!("CDP socket error: {}", e);
                break;
            }
            None => {
                warn!("CDP socket closed by peer");
                break;
            }
        };

        match message {
            Message::Text(text) => {
                if let Ok(response) = serde_json::from_str::<CdpRpcResponse>(&text) {
                    let waiter = pending.lock().await.remove(&response.id);
                    match waiter {
                        Some(sender) => {
                            let _ = sender.send(response);
                        }
                        None => warn!("Response for unknown command id {}", response.id),
                    }
                } else if let Ok(event) = serde_json::from_str::<CdpNotification>(&text) {
                    debug!("CDP event {}", event.method);
                } else {
                    warn!("Unparseable CDP message: {}", text);
                }
            }
            Message::Close(_) => {
                debug!("CDP close frame received");
                break;
            }
            _ => {}
        }
    }

    active.store(false, Ordering::SeqCst);
    // Wake up every caller still waiting on a response.
    pending.lock().await.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_table_routing() {
        let table = TimeoutTable::default();
        assert_eq!(
            table.for_method("Page.captureScreenshot"),
            tokio::time::Duration::from_secs(90)
        );
        assert_eq!(
            table.for_method("Page.navigate"),
            tokio::time::Duration::from_secs(60)
        );
        assert_eq!(
            table.for_method("Runtime.evaluate"),
            tokio::time::Duration::from_secs(30)
        );
    }
}
