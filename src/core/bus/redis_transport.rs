//=========================================================================
// Redis Transport
//=========================================================================
//
// Redis pub/sub as the bus and Redis string keys as the snapshot store.
// Compiled only with the `redis` feature.
//
// A Redis pub/sub connection cannot issue other commands, so every
// subscription runs a small listener thread that owns its own connection
// and forwards messages into a crossbeam channel. The subscription side
// then has the same bounded-timeout receive as the local bus.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use ::redis::{Client, Commands, Connection, RedisError};

//=== Internal Dependencies ===============================================

use super::{Bus, BusError, Message, SnapshotStore, StoreError, Subscription, Topic};

/// How long the listener blocks on the socket before re-checking whether
/// its subscription was dropped.
const LISTEN_POLL: Duration = Duration::from_millis(500);

//=== RedisBus ============================================================

pub struct RedisBus {
    client: Client,
    publisher: Mutex<Connection>,
    retry: Duration,
}

impl RedisBus {
    /// Connects to `url`. Failure here is the one fatal transport error.
    pub fn connect(url: &str, retry: Duration) -> Result<Self, BusError> {
        let client = Client::open(url).map_err(transport)?;
        let publisher = client.get_connection().map_err(transport)?;
        info!(target: "bus", "Connected to redis bus at {}", url);

        Ok(Self {
            client,
            publisher: Mutex::new(publisher),
            retry,
        })
    }
}

impl Bus for RedisBus {
    fn publish(&self, topic: &Topic, payload: &str) -> Result<(), BusError> {
        self.publisher
            .lock()
            .publish::<_, _, ()>(topic.name(), payload)
            .map_err(transport)
    }

    fn subscribe(&self, topics: &[Topic]) -> Result<Box<dyn Subscription>, BusError> {
        let (sender, receiver) = unbounded();
        let channels: Vec<String> = topics.iter().map(Topic::name).collect();
        let client = self.client.clone();
        let retry = self.retry;

        thread::Builder::new()
            .name("redis-listener".into())
            .spawn(move || listen(client, channels, sender, retry))
            .map_err(|e| BusError::Transport(e.to_string()))?;

        Ok(Box::new(RedisSubscription { receiver }))
    }
}

//--- Listener thread -----------------------------------------------------

fn listen(client: Client, channels: Vec<String>, sender: Sender<Message>, retry: Duration) {
    loop {
        match listen_once(&client, &channels, &sender) {
            Ok(()) => {
                debug!(target: "bus", "Subscription dropped, listener exiting");
                return;
            }
            Err(e) => {
                warn!(target: "bus", "Redis listener error: {}; retrying in {:?}", e, retry);
                thread::sleep(retry);
            }
        }
    }
}

/// Runs until the receiver is dropped (`Ok`) or the connection fails.
fn listen_once(client: &Client, channels: &[String], sender: &Sender<Message>) -> Result<(), RedisError> {
    let mut connection = client.get_connection()?;
    let mut pubsub = connection.as_pubsub();

    for channel in channels {
        pubsub.subscribe(channel)?;
    }
    pubsub.set_read_timeout(Some(LISTEN_POLL))?;

    loop {
        let msg = match pubsub.get_message() {
            Ok(msg) => msg,
            Err(e) if e.is_timeout() => {
                if sender.send(Message::new("", "")).is_err() {
                    return Ok(());
                }
                continue;
            }
            Err(e) => return Err(e),
        };

        let payload: String = msg.get_payload().unwrap_or_default();
        if sender.send(Message::new(msg.get_channel_name(), payload)).is_err() {
            return Ok(());
        }
    }
}

//=== RedisSubscription ===================================================

struct RedisSubscription {
    receiver: Receiver<Message>,
}

impl Subscription for RedisSubscription {
    fn receive(&mut self, timeout: Duration) -> Result<Option<Message>, BusError> {
        let deadline = std::time::Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            match self.receiver.recv_timeout(remaining) {
                // Keep-alive probes from the listener carry no topic.
                Ok(message) if message.topic.is_empty() => continue,
                Ok(message) => return Ok(Some(message)),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => return Err(BusError::Disconnected),
            }
        }
    }
}

//=== RedisStore ==========================================================

pub struct RedisStore {
    connection: Mutex<Connection>,
}

impl RedisStore {
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let connection = Client::open(url)
            .and_then(|client| client.get_connection())
            .map_err(unavailable)?;

        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl SnapshotStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.connection.lock().get(key).map_err(unavailable)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.connection.lock().set::<_, _, ()>(key, value).map_err(unavailable)
    }
}

//--- Error mapping -------------------------------------------------------

fn transport(e: RedisError) -> BusError {
    BusError::Transport(e.to_string())
}

fn unavailable(e: RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}
