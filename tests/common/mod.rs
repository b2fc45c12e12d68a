#![allow(dead_code)]

use std::{
    num::NonZeroUsize,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use comms::{CommsErr, Transport};
use machine_learning::dataset::{Dataset, Sample};
use smart_lights::telemetry::TrainingSource;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    task::JoinHandle,
};

pub const SENSOR_TOPIC: &str = "sensors/temperature";
pub const DECISION_TOPIC: &str = "smart_home/ai_decision";

#[derive(Default)]
struct MemoryState {
    session: AtomicU64,
    offline: AtomicBool,
    disconnected: AtomicBool,
    subscriptions: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

/// An in-memory broker link recording what goes through it.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<MemoryState>,
}

impl MemoryTransport {
    pub fn offline() -> Self {
        let transport = Self::default();
        transport.state.offline.store(true, Ordering::SeqCst);
        transport
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.subscriptions.lock().unwrap().clone()
    }

    pub fn was_disconnected(&self) -> bool {
        self.state.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn session(&self) -> u64 {
        self.state.session.load(Ordering::SeqCst)
    }

    async fn subscribe(&self, topic: &str) -> comms::Result<()> {
        if self.state.offline.load(Ordering::SeqCst) {
            return Err(CommsErr::NotConnected);
        }

        self.state
            .subscriptions
            .lock()
            .unwrap()
            .push(topic.to_string());
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> comms::Result<()> {
        if self.state.offline.load(Ordering::SeqCst) {
            return Err(CommsErr::NotConnected);
        }

        self.state
            .published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&self) -> comms::Result<()> {
        self.state.offline.store(true, Ordering::SeqCst);
        self.state.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A training source handing out a fixed dataset.
pub struct StaticSource {
    pub dataset: Dataset,
    pub requested: Mutex<Vec<usize>>,
}

impl StaticSource {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            requested: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TrainingSource for StaticSource {
    async fn fetch(&self, max_results: NonZeroUsize) -> Dataset {
        self.requested.lock().unwrap().push(max_results.get());
        self.dataset.clone()
    }
}

/// Labels a sample `1` when the room is dark and occupied.
pub fn dark_and_occupied(n: usize) -> Dataset {
    (0..n)
        .map(|i| {
            let light = (i * 37 % 400) as f64;
            let occupancy = (i % 3 != 0) as i64;
            Sample {
                temperature: 18.0 + (i % 10) as f64,
                light,
                occupancy,
                light_switch: (light < 150.0 && occupancy == 1) as i64,
            }
        })
        .collect()
}

/// Serves a single canned HTTP response on a local port.
///
/// # Returns
/// The base URL to reach the server and a handle resolving to the raw request head.
pub async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let mut head = Vec::new();
        let mut buf = [0u8; 1024];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }

        let resp = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(resp.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();

        String::from_utf8_lossy(&head).into_owned()
    });

    (format!("http://{addr}"), handle)
}

/// Returns a local port nobody listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
