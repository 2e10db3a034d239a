//! In-process mock feed server for integration tests.
//!
//! Accepts WebSocket connections on an ephemeral port, records every text
//! frame it receives and follows a per-connection script.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// How the server treats one incoming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Drop the TCP stream before the WebSocket handshake.
    DropBeforeHandshake,
    /// Hold the TCP stream open without ever answering the upgrade request.
    StallHandshake,
    /// Complete the handshake and keep the connection open.
    Accept,
    /// Complete the handshake, read this many frames, then send a close frame.
    CloseAfter(usize),
}

#[derive(Default)]
struct Shared {
    received: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Behavior>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    connections: AtomicU32,
    client_closes: AtomicU32,
}

pub struct MockFeedServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl MockFeedServer {
    /// Start a server that accepts every connection.
    pub async fn start() -> Self {
        Self::with_script(Vec::new()).await
    }

    /// Start a server that applies `script` to connections in order, then
    /// accepts every later connection.
    pub async fn with_script(script: Vec<Behavior>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());
        *shared.script.lock().await = script.into();

        let accept_shared = shared.clone();
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_shared.connections.fetch_add(1, Ordering::SeqCst);
                let behavior = accept_shared
                    .script
                    .lock()
                    .await
                    .pop_front()
                    .unwrap_or(Behavior::Accept);
                tokio::spawn(handle_connection(stream, behavior, accept_shared.clone()));
            }
        });

        Self { addr, shared, task }
    }

    /// The server's WebSocket URL.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Number of TCP connections accepted so far.
    pub fn connection_count(&self) -> u32 {
        self.shared.connections.load(Ordering::SeqCst)
    }

    /// Number of close frames received from clients.
    pub fn client_close_count(&self) -> u32 {
        self.shared.client_closes.load(Ordering::SeqCst)
    }

    /// All text frames received, across connections.
    pub async fn received(&self) -> Vec<String> {
        self.shared.received.lock().await.clone()
    }

    /// Received frames decoded as JSON.
    pub async fn received_json(&self) -> Vec<serde_json::Value> {
        self.received()
            .await
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    /// Wait until at least `count` frames have been received.
    pub async fn wait_for_received(&self, count: usize) -> Vec<serde_json::Value> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.shared.received.lock().await.len() >= count {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} frames"));
        self.received_json().await
    }

    /// Wait until the client has sent `count` close frames.
    pub async fn wait_for_client_closes(&self, count: u32) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.client_close_count() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {count} client closes"));
    }

    /// Push a text frame to the most recent accepted connection.
    pub async fn push(&self, text: impl Into<String>) {
        let outbound = self.shared.outbound.lock().await;
        outbound
            .as_ref()
            .expect("no live connection")
            .send(text.into())
            .unwrap();
    }
}

impl Drop for MockFeedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn handle_connection(stream: TcpStream, behavior: Behavior, shared: Arc<Shared>) {
    if behavior == Behavior::DropBeforeHandshake {
        drop(stream);
        return;
    }
    if behavior == Behavior::StallHandshake {
        let mut stream = stream;
        let mut buf = [0u8; 1024];
        // Read and discard until the client goes away.
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
        shared.client_closes.fetch_add(1, Ordering::SeqCst);
        return;
    }

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    *shared.outbound.lock().await = Some(tx);

    let mut seen = 0;
    loop {
        tokio::select! {
            Some(text) = rx.recv() => {
                if write.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    shared.received.lock().await.push(text.as_str().to_owned());
                    seen += 1;
                    if behavior == Behavior::CloseAfter(seen) {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    shared.client_closes.fetch_add(1, Ordering::SeqCst);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            }
        }
    }
}

/// Install a test subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
