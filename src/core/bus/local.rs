//=========================================================================
// Local Bus
//=========================================================================
//
// In-process publish/subscribe transport over crossbeam channels.
//
// Each subscription owns an unbounded channel. Publishing fans the message
// out to every subscription registered for the topic, in publish order.
// Subscriptions whose receiver was dropped are pruned on the next publish.
//
//=========================================================================

//=== External Dependencies ===============================================

use std::collections::HashSet;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::trace;
use parking_lot::Mutex;

//=== Internal Dependencies ===============================================

use super::{Bus, BusError, Message, Subscription, Topic};

//=== LocalBus ============================================================

struct Subscriber {
    topics: HashSet<String>,
    sender: Sender<Message>,
}

/// Publish/subscribe bus shared by threads of one process.
#[derive(Default)]
pub struct LocalBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl Bus for LocalBus {
    fn publish(&self, topic: &Topic, payload: &str) -> Result<(), BusError> {
        let name = topic.name();
        let message = Message::new(name.clone(), payload);

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            if !sub.topics.contains(&name) {
                return true;
            }
            sub.sender.send(message.clone()).is_ok()
        });

        trace!(target: "bus", "published on {} to {} subscriber(s)", name, subscribers.len());
        Ok(())
    }

    fn subscribe(&self, topics: &[Topic]) -> Result<Box<dyn Subscription>, BusError> {
        let (sender, receiver) = unbounded();
        let topics = topics.iter().map(Topic::name).collect();

        self.subscribers.lock().push(Subscriber { topics, sender });
        Ok(Box::new(LocalSubscription { receiver }))
    }
}

//=== LocalSubscription ===================================================

struct LocalSubscription {
    receiver: Receiver<Message>,
}

impl Subscription for LocalSubscription {
    fn receive(&mut self, timeout: Duration) -> Result<Option<Message>, BusError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Disconnected),
        }
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
