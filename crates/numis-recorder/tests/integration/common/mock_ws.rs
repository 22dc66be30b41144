//! Mock Kraken v2 websocket server.
//!
//! Each accepted connection acks its `subscribe`, pushes `trades_per_subscribe`
//! trade frames for the subscribed pair (or one garbled frame when `garble`
//! is set) and confirms `unsubscribe`.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

#[derive(Debug, Clone, Copy, Default)]
pub struct MockBehavior {
    pub trades_per_subscribe: usize,
    pub garble: bool,
}

pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    requests: Arc<Mutex<Vec<Value>>>,
    connections: Arc<AtomicUsize>,
}

impl MockWsServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let requests_clone = requests.clone();
        let connections_clone = connections.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        connections_clone.fetch_add(1, Ordering::SeqCst);
                        tokio::spawn(handle_connection(stream, behavior, requests_clone.clone()));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            requests,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Pairs named in received requests with the given `method`.
    pub async fn pairs_for(&self, method: &str) -> Vec<String> {
        let mut pairs: Vec<String> = self
            .requests
            .lock()
            .await
            .iter()
            .filter(|r| r["method"] == method)
            .filter_map(|r| r["params"]["symbol"][0].as_str().map(str::to_string))
            .collect();
        pairs.sort();
        pairs
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(stream: TcpStream, behavior: MockBehavior, requests: Arc<Mutex<Vec<Value>>>) {
    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    while let Some(Ok(Message::Text(text))) = read.next().await {
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        requests.lock().await.push(request.clone());

        let params = &request["params"];
        let pair = params["symbol"][0].as_str().unwrap_or_default().to_string();
        let result = json!({"channel": params["channel"], "symbol": pair});

        match request["method"].as_str() {
            Some("subscribe") => {
                let ack = json!({"method": "subscribe", "result": result, "success": true});
                let _ = write.send(Message::Text(ack.to_string())).await;
                if behavior.garble {
                    let _ = write.send(Message::Text("{not json".to_string())).await;
                    continue;
                }
                for i in 0..behavior.trades_per_subscribe {
                    let trade = json!({
                        "channel": "trade",
                        "type": "update",
                        "data": [{
                            "symbol": pair,
                            "side": "buy",
                            "price": 100 + i,
                            "qty": 1.5,
                            "ord_type": "limit",
                            "trade_id": i,
                            "timestamp": "2024-05-01T12:00:00.000000Z",
                        }],
                    });
                    let _ = write.send(Message::Text(trade.to_string())).await;
                }
            }
            Some("unsubscribe") => {
                let ack = json!({"method": "unsubscribe", "result": result, "success": true});
                let _ = write.send(Message::Text(ack.to_string())).await;
            }
            _ => {}
        }
    }
}
