//! Mock exchange websocket server for listener tests.
//!
//! Speaks just enough of the Kraken v2 protocol:
//! - Acks `subscribe` and then pushes scripted frames
//! - Optionally confirms `unsubscribe`, after scripted noise frames
//! - Records every text frame received from the client

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Scripted server behavior.
#[derive(Debug, Clone)]
pub struct MockScript {
    /// Frames pushed right after the subscribe ack.
    pub after_subscribe: Vec<String>,
    /// Close the connection after sending `after_subscribe`.
    pub close_after_subscribe: bool,
    /// Frames pushed after an unsubscribe request, before its confirmation.
    pub before_unsubscribe_confirmation: Vec<String>,
    /// Answer unsubscribe requests.
    pub confirm_unsubscribe: bool,
    /// Answer subscribe requests with this error instead of an ack.
    pub reject_subscribe: Option<String>,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            after_subscribe: Vec::new(),
            close_after_subscribe: false,
            before_unsubscribe_confirmation: Vec::new(),
            confirm_unsubscribe: true,
            reject_subscribe: None,
        }
    }
}

pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    messages: Arc<Mutex<Vec<String>>>,
}

impl MockWsServer {
    pub async fn start() -> Self {
        Self::with_script(MockScript::default()).await
    }

    pub async fn with_script(script: MockScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let messages = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let messages_clone = messages.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(stream, script.clone(), messages_clone.clone()));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            messages,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn received_messages(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }

    /// Number of received requests with the given `method`.
    pub async fn count_method(&self, method: &str) -> usize {
        self.received_messages()
            .await
            .iter()
            .filter_map(|m| serde_json::from_str::<Value>(m).ok())
            .filter(|v| v["method"] == method)
            .count()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(stream: TcpStream, script: MockScript, messages: Arc<Mutex<Vec<String>>>) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    while let Some(Ok(msg)) = read.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Ping(data) => {
                let _ = write.send(Message::Pong(data)).await;
                continue;
            }
            Message::Close(_) => break,
            _ => continue,
        };
        messages.lock().await.push(text.clone());

        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let params = &request["params"];
        let result = json!({
            "channel": params["channel"],
            "symbol": params["symbol"][0],
        });

        match request["method"].as_str() {
            Some("subscribe") => {
                if let Some(error) = &script.reject_subscribe {
                    let nack = json!({"method": "subscribe", "error": error, "success": false});
                    let _ = write.send(Message::Text(nack.to_string())).await;
                    continue;
                }
                let ack = json!({"method": "subscribe", "result": result, "success": true});
                let _ = write.send(Message::Text(ack.to_string())).await;
                for frame in &script.after_subscribe {
                    let _ = write.send(Message::Text(frame.clone())).await;
                }
                if script.close_after_subscribe {
                    let _ = write.close().await;
                    return;
                }
            }
            Some("unsubscribe") => {
                for frame in &script.before_unsubscribe_confirmation {
                    let _ = write.send(Message::Text(frame.clone())).await;
                }
                if script.confirm_unsubscribe {
                    let ack = json!({"method": "unsubscribe", "result": result, "success": true});
                    let _ = write.send(Message::Text(ack.to_string())).await;
                }
            }
            _ => {}
        }
    }
}

/// A Kraken v2 trade frame with one trade.
pub fn trade_frame(pair: &str, price: &str, side: &str) -> String {
    format!(
        r#"{{"channel":"trade","type":"update","data":[{{"symbol":"{pair}","side":"{side}","price":{price},"qty":0.5,"ord_type":"market","trade_id":1,"timestamp":"2024-05-01T12:00:00.000000Z"}}]}}"#
    )
}
