use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use comms::{
    BrokerConfig, CommsErr, Delivery, Inbound, Publisher, SensorListener, Transport,
    msg::{Decision, Lights, Reading},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{mpsc, oneshot},
    time::{self, Instant},
};

const SENSOR_TOPIC: &str = "sensors/temperature";
const DECISION_TOPIC: &str = "smart_home/ai_decision";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct MemoryState {
    session: AtomicU64,
    offline: AtomicBool,
    subscriptions: Mutex<Vec<String>>,
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

/// An in-memory broker link recording what goes through it.
#[derive(Clone, Default)]
struct MemoryTransport {
    state: Arc<MemoryState>,
}

impl MemoryTransport {
    fn offline() -> Self {
        let transport = Self::default();
        transport.state.offline.store(true, Ordering::SeqCst);
        transport
    }

    fn subscriptions(&self) -> Vec<String> {
        self.state.subscriptions.lock().unwrap().clone()
    }

    fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.state.published.lock().unwrap().clone()
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
        Ok(())
    }
}

fn sensor_msg(payload: &str) -> Inbound {
    Inbound {
        topic: SENSOR_TOPIC.to_string(),
        payload: payload.as_bytes().to_vec(),
    }
}

fn sensor_listener(
    transport: &MemoryTransport,
) -> (SensorListener<MemoryTransport>, mpsc::Sender<Inbound>) {
    let (tx, inbox) = mpsc::channel(16);
    (SensorListener::new(transport.clone(), SENSOR_TOPIC, inbox), tx)
}

#[tokio::test]
async fn listener_returns_decoded_reading() {
    let transport = MemoryTransport::default();
    let (mut listener, tx) = sensor_listener(&transport);

    tx.send(sensor_msg(r#"{"temperature": 23.5, "light": 120, "occupancy": 1}"#))
        .await
        .unwrap();

    let reading = listener.await_reading(Duration::from_secs(1)).await;

    assert_eq!(
        reading,
        Some(Reading {
            temperature: 23.5,
            light: 120.0,
            occupancy: 1
        })
    );
    assert_eq!(transport.subscriptions(), vec![SENSOR_TOPIC.to_string()]);
}

#[tokio::test(start_paused = true)]
async fn listener_times_out_without_messages() {
    let transport = MemoryTransport::default();
    let (mut listener, _tx) = sensor_listener(&transport);
    let timeout = Duration::from_secs(5);

    let start = Instant::now();
    let reading = listener.await_reading(timeout).await;
    let elapsed = start.elapsed();

    assert_eq!(reading, None);
    assert!(elapsed >= timeout);
    assert!(elapsed <= timeout + POLL_INTERVAL);
}

#[tokio::test]
async fn listener_skips_undecodable_messages() {
    let transport = MemoryTransport::default();
    let (mut listener, tx) = sensor_listener(&transport);

    tx.send(sensor_msg("{not json")).await.unwrap();
    tx.send(sensor_msg(r#"{"temperature": "hot"}"#)).await.unwrap();
    tx.send(sensor_msg(r#"{"light": 5}"#)).await.unwrap();

    let reading = listener.await_reading(Duration::from_secs(1)).await;

    assert_eq!(
        reading,
        Some(Reading {
            temperature: 0.0,
            light: 5.0,
            occupancy: 0
        })
    );
}

#[tokio::test(start_paused = true)]
async fn listener_times_out_when_only_garbage_arrives() {
    let transport = MemoryTransport::default();
    let (mut listener, tx) = sensor_listener(&transport);

    tx.send(sensor_msg("garbage")).await.unwrap();

    let timeout = Duration::from_secs(5);
    let start = Instant::now();
    assert_eq!(listener.await_reading(timeout).await, None);
    assert!(start.elapsed() <= timeout + POLL_INTERVAL);
}

#[tokio::test]
async fn listener_ignores_other_topics() {
    let transport = MemoryTransport::default();
    let (mut listener, tx) = sensor_listener(&transport);

    tx.send(Inbound {
        topic: "sensors/humidity".to_string(),
        payload: br#"{"temperature": 99}"#.to_vec(),
    })
    .await
    .unwrap();
    tx.send(sensor_msg(r#"{"temperature": 21}"#)).await.unwrap();

    let reading = listener.await_reading(Duration::from_secs(1)).await.unwrap();
    assert_eq!(reading.temperature, 21.0);
}

#[tokio::test]
async fn listener_returns_none_once_the_link_is_gone() {
    let transport = MemoryTransport::default();
    let (mut listener, tx) = sensor_listener(&transport);
    drop(tx);

    let start = Instant::now();
    assert_eq!(listener.await_reading(Duration::from_secs(30)).await, None);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn listener_subscribes_once_per_session() {
    let transport = MemoryTransport::default();
    let (mut listener, _tx) = sensor_listener(&transport);
    let timeout = Duration::from_millis(10);

    listener.await_reading(timeout).await;
    listener.await_reading(timeout).await;
    assert_eq!(transport.subscriptions().len(), 1);

    // The broker acknowledged a reconnection.
    transport.state.session.fetch_add(1, Ordering::SeqCst);
    listener.await_reading(timeout).await;
    listener.await_reading(timeout).await;
    assert_eq!(transport.subscriptions().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn listener_retries_subscription_after_failure() {
    let transport = MemoryTransport::offline();
    let (mut listener, _tx) = sensor_listener(&transport);
    let timeout = Duration::from_millis(10);

    listener.await_reading(timeout).await;
    assert!(transport.subscriptions().is_empty());

    transport.state.offline.store(false, Ordering::SeqCst);
    listener.await_reading(timeout).await;
    assert_eq!(transport.subscriptions(), vec![SENSOR_TOPIC.to_string()]);
}

#[tokio::test]
async fn publisher_sends_flat_decision() {
    let transport = MemoryTransport::default();
    let publisher = Publisher::new(transport.clone(), DECISION_TOPIC);
    let decision = Decision {
        lights: Lights::On,
        timestamp: 1718000000.5,
    };

    assert_eq!(publisher.publish(&decision).await, Delivery::Sent);

    let published = transport.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, DECISION_TOPIC);

    let body: serde_json::Value = serde_json::from_slice(&published[0].1).unwrap();
    assert_eq!(body, serde_json::json!({"lights": "ON", "timestamp": 1718000000.5}));
}

#[tokio::test]
async fn publisher_reports_failure_on_offline_link() {
    let transport = MemoryTransport::offline();
    let publisher = Publisher::new(transport.clone(), DECISION_TOPIC);

    let delivery = publisher.publish(&Decision::now(Lights::Off)).await;

    assert_eq!(delivery, Delivery::Failed);
    assert!(transport.published().is_empty());
}

/// Returns a local port nobody listens on.
async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn broker_cfg(port: u16, inbox_capacity: usize) -> BrokerConfig {
    BrokerConfig {
        host: "127.0.0.1".to_string(),
        port,
        client_id: "smart-lights-test".to_string(),
        keep_alive: Duration::from_secs(60),
        connect_timeout: Duration::from_secs(2),
        reconnect_delay: Duration::from_millis(50),
        inbox_capacity,
    }
}

#[tokio::test]
async fn mqtt_link_to_unreachable_broker_degrades_gracefully() {
    let cfg = BrokerConfig {
        connect_timeout: Duration::from_millis(500),
        ..broker_cfg(closed_port().await, 4)
    };

    let connection = comms::connect(&cfg).await;
    assert!(!connection.transport.is_connected());

    let publisher = Publisher::new(connection.transport.clone(), DECISION_TOPIC);
    let delivery = publisher.publish(&Decision::now(Lights::On)).await;
    assert_eq!(delivery, Delivery::Failed);

    let mut listener = SensorListener::new(connection.transport, SENSOR_TOPIC, connection.inbox);
    let timeout = Duration::from_millis(200);
    let start = Instant::now();
    assert_eq!(listener.await_reading(timeout).await, None);
    assert!(start.elapsed() <= timeout + POLL_INTERVAL);

    connection.task.abort();
}

// A scripted MQTT 3.1.1 broker speaking just enough of the protocol for one client.

const CONNECT: u8 = 0x10;
const SUBSCRIBE: u8 = 0x82;
const DISCONNECT: u8 = 0xE0;
const CONNACK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

async fn read_packet(stream: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
    let header = stream.read_u8().await.ok()?;

    let mut len = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await.ok()?;
        len |= usize::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; len];
    stream.read_exact(&mut body).await.ok()?;
    Some((header, body))
}

fn push_len(mut len: usize, out: &mut Vec<u8>) {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if len == 0 {
            break;
        }
    }
}

/// A QoS 0 PUBLISH packet.
fn publish_packet(topic: &str, payload: &str) -> Vec<u8> {
    let mut out = vec![0x30];
    push_len(2 + topic.len() + payload.len(), &mut out);
    out.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    out.extend_from_slice(topic.as_bytes());
    out.extend_from_slice(payload.as_bytes());
    out
}

/// Reads the client's CONNECT and accepts it.
async fn handshake(stream: &mut TcpStream) {
    let (header, _) = read_packet(stream).await.unwrap();
    assert_eq!(header, CONNECT);
    stream.write_all(&CONNACK).await.unwrap();
}

/// Waits for a SUBSCRIBE, acknowledges it and publishes `payload` on the subscribed topic.
///
/// # Returns
/// The subscribed topic filter.
async fn serve_subscribe(stream: &mut TcpStream, payload: &str) -> String {
    let body = loop {
        let (header, body) = read_packet(stream).await.unwrap();
        if header == SUBSCRIBE {
            break body;
        }
    };

    let topic_len = usize::from(u16::from_be_bytes([body[2], body[3]]));
    let topic = String::from_utf8(body[4..4 + topic_len].to_vec()).unwrap();

    stream
        .write_all(&[0x90, 0x03, body[0], body[1], 0x00])
        .await
        .unwrap();
    stream
        .write_all(&publish_packet(&topic, payload))
        .await
        .unwrap();

    topic
}

/// Counts the SUBSCRIBEs sent until the client disconnects.
async fn drain_until_disconnect(stream: &mut TcpStream) -> usize {
    let mut subscribes = 0;
    while let Some((header, _)) = read_packet(stream).await {
        match header {
            SUBSCRIBE => subscribes += 1,
            DISCONNECT => break,
            _ => {}
        }
    }
    subscribes
}

#[tokio::test]
async fn mqtt_link_resubscribes_after_the_broker_drops_it() {
    let broker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = broker.local_addr().unwrap().port();
    let (cut_tx, cut_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let mut topics = Vec::new();

        let (mut stream, _) = broker.accept().await.unwrap();
        handshake(&mut stream).await;
        topics.push(serve_subscribe(&mut stream, r#"{"temperature": 11}"#).await);
        cut_rx.await.unwrap();
        drop(stream);

        let (mut stream, _) = broker.accept().await.unwrap();
        handshake(&mut stream).await;
        topics.push(serve_subscribe(&mut stream, r#"{"temperature": 22}"#).await);
        let extra = drain_until_disconnect(&mut stream).await;

        (topics, extra)
    });

    let connection = comms::connect(&broker_cfg(port, 16)).await;
    let transport = connection.transport.clone();
    assert!(transport.is_connected());
    assert_eq!(transport.session(), 1);

    let mut listener = SensorListener::new(transport.clone(), SENSOR_TOPIC, connection.inbox);
    let first = listener.await_reading(Duration::from_secs(2)).await.unwrap();
    assert_eq!(first.temperature, 11.0);

    cut_tx.send(()).unwrap();
    time::timeout(Duration::from_secs(5), async {
        while !(transport.session() == 2 && transport.is_connected()) {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("broker never acknowledged the reconnection");

    let second = listener.await_reading(Duration::from_secs(2)).await.unwrap();
    assert_eq!(second.temperature, 22.0);

    transport.disconnect().await.unwrap();
    let (topics, extra) = time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(topics, vec![SENSOR_TOPIC.to_string(), SENSOR_TOPIC.to_string()]);
    assert_eq!(extra, 0);

    time::timeout(Duration::from_secs(2), connection.task)
        .await
        .expect("event loop kept running after disconnect")
        .unwrap();
}

#[tokio::test]
async fn mqtt_link_drops_the_newest_message_when_the_inbox_is_full() {
    let broker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = broker.local_addr().unwrap().port();
    let (more_tx, more_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let (mut stream, _) = broker.accept().await.unwrap();
        handshake(&mut stream).await;

        let burst: Vec<u8> = [1, 2, 3]
            .into_iter()
            .flat_map(|t| publish_packet(SENSOR_TOPIC, &format!(r#"{{"temperature": {t}}}"#)))
            .collect();
        stream.write_all(&burst).await.unwrap();

        more_rx.await.unwrap();
        stream
            .write_all(&publish_packet(SENSOR_TOPIC, r#"{"temperature": 4}"#))
            .await
            .unwrap();

        drain_until_disconnect(&mut stream).await
    });

    let connection = comms::connect(&broker_cfg(port, 1)).await;
    let transport = connection.transport.clone();
    let mut inbox = connection.inbox;

    // Leaves the event loop time to take the whole burst off the socket.
    time::sleep(Duration::from_millis(300)).await;

    let kept = inbox.recv().await.unwrap();
    assert_eq!(kept.topic, SENSOR_TOPIC);
    assert_eq!(Reading::decode(&kept.payload).unwrap().temperature, 1.0);
    assert!(inbox.try_recv().is_err());

    // The link survives the overflow.
    more_tx.send(()).unwrap();
    let next = time::timeout(Duration::from_secs(2), inbox.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Reading::decode(&next.payload).unwrap().temperature, 4.0);

    transport.disconnect().await.unwrap();
    let subscribes = time::timeout(Duration::from_secs(2), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subscribes, 0);
    connection.task.abort();
}
