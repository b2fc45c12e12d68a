use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time,
};

use crate::{CommsErr, Result};

/// A message delivered by the broker on one of the subscribed topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// The receiving end of the messages delivered by the broker.
pub type Inbox = mpsc::Receiver<Inbound>;

/// The publish/subscribe operations the listener and the publisher need from a broker link.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns the number of the current broker session. It changes every time the broker
    /// acknowledges a (re)connection, subscriptions don't survive across sessions.
    fn session(&self) -> u64;

    /// Subscribes to `topic`, deliveries will show up on the transport's inbox.
    async fn subscribe(&self, topic: &str) -> Result<()>;

    /// Publishes `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Gracefully closes the broker link.
    async fn disconnect(&self) -> Result<()>;
}

/// Where and how to reach the broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive: Duration,
    /// How long `connect` waits for the first acknowledgement before moving on.
    pub connect_timeout: Duration,
    /// Pause between two reconnection attempts.
    pub reconnect_delay: Duration,
    /// How many undelivered inbound messages are buffered.
    pub inbox_capacity: usize,
}

#[derive(Debug, Default)]
struct LinkState {
    session: AtomicU64,
    connected: AtomicBool,
}

/// A `Transport` over an MQTT broker.
///
/// The client only enqueues requests, the network side is driven by a background task
/// polling the event loop, see `connect`.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    link: Arc<LinkState>,
}

impl MqttTransport {
    /// Returns whether the broker acknowledged the current connection.
    pub fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::Acquire)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(CommsErr::NotConnected)
        }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    fn session(&self) -> u64 {
        self.link.session.load(Ordering::Acquire)
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.ensure_connected()?;
        self.client.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        self.ensure_connected()?;
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.client.try_disconnect()?;
        Ok(())
    }
}

/// A live broker link: the transport handle, the inbox fed by the event loop task and the
/// task itself.
pub struct Connection {
    pub transport: MqttTransport,
    pub inbox: Inbox,
    pub task: JoinHandle<()>,
}

/// Opens a broker link and spawns the task driving it.
///
/// Waits up to `cfg.connect_timeout` for the broker's first acknowledgement. A broker that
/// can't be reached is logged but not fatal, the event loop task keeps retrying every
/// `cfg.reconnect_delay` and the link comes up whenever the broker does.
///
/// # Arguments
/// * `cfg` - The broker's address and the link's tuning.
///
/// # Returns
/// The connection, whether or not the broker acknowledged it yet.
pub async fn connect(cfg: &BrokerConfig) -> Connection {
    let mut options = MqttOptions::new(&cfg.client_id, &cfg.host, cfg.port);
    options.set_keep_alive(cfg.keep_alive);
    options.set_clean_session(true);

    let (client, eventloop) = AsyncClient::new(options, 10);
    let (tx, inbox) = mpsc::channel(cfg.inbox_capacity.max(1));
    let (ready_tx, ready_rx) = oneshot::channel();
    let link = Arc::new(LinkState::default());

    let task = tokio::spawn(drive(
        eventloop,
        tx,
        Arc::clone(&link),
        ready_tx,
        cfg.reconnect_delay,
    ));

    let addr = format!("{}:{}", cfg.host, cfg.port);
    match time::timeout(cfg.connect_timeout, ready_rx).await {
        Ok(Ok(true)) => info!("connected to broker at {addr}"),
        Ok(Ok(false)) | Ok(Err(_)) => error!("failed to connect to broker at {addr}"),
        Err(_) => error!(
            "no acknowledgement from broker at {addr} after {:?}",
            cfg.connect_timeout
        ),
    }

    Connection {
        transport: MqttTransport { client, link },
        inbox,
        task,
    }
}

/// Polls the event loop until the link is closed, forwarding every publish to the inbox.
async fn drive(
    mut eventloop: EventLoop,
    tx: mpsc::Sender<Inbound>,
    link: Arc<LinkState>,
    ready: oneshot::Sender<bool>,
    reconnect_delay: Duration,
) {
    let mut ready = Some(ready);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                let session = link.session.fetch_add(1, Ordering::AcqRel) + 1;
                link.connected.store(true, Ordering::Release);
                debug!(session = session; "broker acknowledged connection: {:?}", ack.code);

                if let Some(ready) = ready.take() {
                    let _ = ready.send(true);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let msg = Inbound {
                    topic: publish.topic,
                    payload: publish.payload.to_vec(),
                };

                match tx.try_send(msg) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(msg)) => {
                        warn!("inbox full, dropping message on {}", msg.topic);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("inbox closed, stopping event loop");
                        break;
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                link.connected.store(false, Ordering::Release);
                info!("disconnected from broker");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let was_connected = link.connected.swap(false, Ordering::AcqRel);
                if was_connected {
                    warn!("lost broker connection: {e}");
                } else {
                    debug!("broker connection attempt failed: {e}");
                }

                if let Some(ready) = ready.take() {
                    let _ = ready.send(false);
                }

                time::sleep(reconnect_delay).await;
            }
        }
    }
}
