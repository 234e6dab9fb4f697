//=========================================================================
// Scoreboard Engine
//
// Runtime that wires the bus, the snapshot store and the canvas to the
// display core.
//
// Architecture:
// ```text
//     ScoreboardBuilder ──build()──> Scoreboard ──start()──> ScoreboardHandle
//         │                                         │
//         ├─ with_canvas()                          ├─ "core" thread (DisplayCore)
//         ├─ with_layout()                          ├─ "bus-main" receive thread
//         └─ with_cycle() ...                       └─ "bus-focus" receive thread
//
// Communication: crossbeam channel of CoreEvent, receive threads → core
// ```
//
//=========================================================================

//=== External Dependencies ===============================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Sender};
use log::{debug, error, info, warn};

//=== Internal Dependencies ===============================================

use crate::config::{ConfigError, MatrixConfig, ScoreboardConfig};
use crate::core::bus::{Bus, SnapshotStore, Subscription, Topic};
use crate::core::patch::Tree;
use crate::core::scheduler::{PageScheduler, PageSizes};
use crate::core::settings::Settings;
use crate::core::store::{default_template, EntityStore};
use crate::core::{CoreEvent, DisplayCore};
use crate::display::{FrameBuffer, Layout, RenderDriver, ScoreboardLayout, SharedFrameBuffer};
use crate::error::{Error, Result};
use crate::raster::Canvas;

/// Floor for every receive and retry wait, so no loop spins on a zero timeout.
const MIN_WAIT: Duration = Duration::from_millis(1);

//=== ScoreboardBuilder ===================================================

/// Builder for a [`Scoreboard`].
///
/// # Default Values
///
/// - **Capacity**: 20 game slots, baseball template
/// - **Canvas**: 384x256 hardware-style [`FrameBuffer`]
/// - **Cycle**: 10 s page cycle
/// - **Receive timeout**: 5 s, **retry**: 1 s
/// - **Channel capacity**: 256 events
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use on_deck::core::bus::{LocalBus, MemoryStore};
/// use on_deck::ScoreboardBuilder;
///
/// let handle = ScoreboardBuilder::new(Arc::new(LocalBus::new()), Arc::new(MemoryStore::new()))
///     .with_capacity(12)
///     .build()
///     .start()
///     .unwrap();
/// handle.shutdown();
/// ```
pub struct ScoreboardBuilder {
    bus: Arc<dyn Bus>,
    snapshots: Arc<dyn SnapshotStore>,
    canvas: Option<Box<dyn Canvas>>,
    layout: Option<Box<dyn Layout>>,
    matrix: MatrixConfig,
    capacity: usize,
    template: Tree,
    page_sizes: PageSizes,
    cycle: Duration,
    receive_timeout: Duration,
    retry: Duration,
    channel_capacity: usize,
}

impl ScoreboardBuilder {
    pub fn new(bus: Arc<dyn Bus>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            bus,
            snapshots,
            canvas: None,
            layout: None,
            matrix: MatrixConfig::default(),
            capacity: 20,
            template: default_template(),
            page_sizes: PageSizes::default(),
            cycle: Duration::from_secs(10),
            receive_timeout: Duration::from_millis(5000),
            retry: Duration::from_millis(1000),
            channel_capacity: 256,
        }
    }

    /// Builder with every setting taken from `config`.
    pub fn from_config(
        config: &ScoreboardConfig,
        bus: Arc<dyn Bus>,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(bus, snapshots)
            .with_matrix(config.matrix)
            .with_capacity(config.store.capacity)
            .with_template(config.store.template()?)
            .with_page_sizes(config.schedule.page_sizes())
            .with_cycle(config.schedule.cycle())
            .with_receive_timeout(config.bus.receive_timeout())
            .with_retry(config.bus.retry()))
    }

    /// Draws to `canvas` instead of a frame buffer sized from the matrix.
    pub fn with_canvas(mut self, canvas: Box<dyn Canvas>) -> Self {
        self.canvas = Some(canvas);
        self
    }

    pub fn with_layout(mut self, layout: Box<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn with_matrix(mut self, matrix: MatrixConfig) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_template(mut self, template: Tree) -> Self {
        self.template = template;
        self
    }

    pub fn with_page_sizes(mut self, page_sizes: PageSizes) -> Self {
        self.page_sizes = page_sizes;
        self
    }

    /// Sets the page-cycle interval.
    ///
    /// # Panics
    ///
    /// Panics if `cycle` is zero.
    pub fn with_cycle(mut self, cycle: Duration) -> Self {
        assert!(!cycle.is_zero(), "Page cycle must be positive");
        self.cycle = cycle;
        self
    }

    /// Upper bound on one bus receive call. Also bounds how long shutdown
    /// waits for the receive threads. Raised to 1 ms if smaller.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout.max(MIN_WAIT);
        self
    }

    /// Sleep between retries after a transport error or a failed cold start.
    /// Raised to 1 ms if smaller.
    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry.max(MIN_WAIT);
        self
    }

    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Channel capacity must be positive");
        self.channel_capacity = capacity;
        self
    }

    pub fn build(self) -> Scoreboard {
        let canvas = self.canvas.unwrap_or_else(|| {
            let frame = FrameBuffer::new(self.matrix.width, self.matrix.height, self.matrix.backend);
            Box::new(SharedFrameBuffer::new(frame))
        });
        let layout = self
            .layout
            .unwrap_or_else(|| Box::new(ScoreboardLayout::new(self.matrix.width, self.matrix.height)));

        info!(
            target: "engine",
            "Building scoreboard ({} slots, {:?} cycle, channel: {})",
            self.capacity, self.cycle, self.channel_capacity
        );

        let store = EntityStore::new(self.capacity, self.template);
        let scheduler = PageScheduler::new(self.page_sizes, self.cycle, Instant::now());
        let driver = RenderDriver::new(canvas, layout);

        Scoreboard {
            core: DisplayCore::new(store, scheduler, driver, self.snapshots.clone()),
            bus: self.bus,
            capacity: self.capacity,
            receive_timeout: self.receive_timeout,
            retry: self.retry,
            channel_capacity: self.channel_capacity,
        }
    }
}

//=== Scoreboard ==========================================================

/// A built display, not yet running.
///
/// # Architecture
///
/// ```text
/// Scoreboard::start()
///   ├─► core thread: cold start, then event loop + page cycle + render
///   ├─► bus-main: entity, settings and control topics ──┐
///   └─► bus-focus: focus entity topic ──────────────────┴─► CoreEvent channel
/// ```
pub struct Scoreboard {
    core: DisplayCore,
    bus: Arc<dyn Bus>,
    capacity: usize,
    receive_timeout: Duration,
    retry: Duration,
    channel_capacity: usize,
}

impl Scoreboard {
    /// Subscribes, then starts the core and both receive threads.
    ///
    /// Subscriptions are opened before the core's cold start, so a change
    /// published after the snapshot read still reaches the core.
    pub fn start(self) -> Result<ScoreboardHandle> {
        info!(target: "engine", "Starting scoreboard runtime");

        //--- 1. Subscribe -------------------------------------------------
        let mut main_topics: Vec<Topic> = Topic::entities(self.capacity).collect();
        main_topics.extend(Topic::CONTROL);
        let main = self.bus.subscribe(&main_topics)?;
        let focus = self.bus.subscribe(&[Topic::Focus])?;

        //--- 2. Create the core channel ----------------------------------
        let (sender, receiver) = bounded(self.channel_capacity);

        //--- 3. Spawn the core thread ------------------------------------
        let core = self.core.spawn(receiver, self.retry)?;
        info!(target: "engine", "Core thread spawned");

        //--- 4. Spawn the receive threads --------------------------------
        let stop = Arc::new(AtomicBool::new(false));
        let receivers = [("bus-main", main), ("bus-focus", focus)]
            .into_iter()
            .map(|(name, subscription)| {
                let pump = ReceivePump {
                    name,
                    subscription,
                    sender: sender.clone(),
                    stop: stop.clone(),
                    timeout: self.receive_timeout,
                    retry: self.retry,
                };
                thread::Builder::new().name(name.into()).spawn(move || pump.run())
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(ScoreboardHandle {
            sender,
            core,
            receivers,
            stop,
        })
    }

    /// Starts the runtime and blocks until the core thread exits.
    pub fn run(self) -> Result<()> {
        self.start()?.wait();
        Ok(())
    }
}

//=== ReceivePump =========================================================
//
// Forwards one subscription into the core channel. Transport errors are
// logged and retried after a sleep; they never end the thread.
//
struct ReceivePump {
    name: &'static str,
    subscription: Box<dyn Subscription>,
    sender: Sender<CoreEvent>,
    stop: Arc<AtomicBool>,
    timeout: Duration,
    retry: Duration,
}

impl ReceivePump {
    fn run(mut self) {
        debug!(target: "bus", "{} receive loop started", self.name);

        while !self.stop.load(Ordering::Relaxed) {
            match self.subscription.receive(self.timeout) {
                Ok(Some(message)) => {
                    if self.sender.send(CoreEvent::Message(message)).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(target: "bus", "{}: {}; retrying in {:?}", self.name, e, self.retry);
                    thread::sleep(self.retry);
                }
            }
        }

        debug!(target: "bus", "{} receive loop stopped", self.name);
    }
}

//=== ScoreboardHandle ====================================================

/// Handle to a running scoreboard.
pub struct ScoreboardHandle {
    sender: Sender<CoreEvent>,
    core: thread::JoinHandle<()>,
    receivers: Vec<thread::JoinHandle<()>>,
    stop: Arc<AtomicBool>,
}

impl ScoreboardHandle {
    /// Current settings, after every event queued before this call.
    pub fn settings(&self) -> Result<Settings> {
        let (reply, response) = bounded(1);
        self.sender
            .send(CoreEvent::Settings(reply))
            .map_err(|_| Error::CoreStopped)?;
        response.recv().map_err(|_| Error::CoreStopped)
    }

    /// Stops every thread without a final flush.
    pub fn shutdown(self) {
        info!(target: "engine", "Shutting down");
        self.stop.store(true, Ordering::Relaxed);
        if self.sender.send(CoreEvent::Shutdown).is_err() {
            debug!(target: "engine", "Core thread already stopped");
        }
        self.join();
    }

    /// Blocks until the core thread exits on its own.
    pub fn wait(self) {
        let ScoreboardHandle {
            sender,
            core,
            receivers,
            stop,
        } = self;
        drop(sender);
        join_logged("core", core);
        stop.store(true, Ordering::Relaxed);
        for receiver in receivers {
            join_logged("receive", receiver);
        }
    }

    fn join(self) {
        join_logged("core", self.core);
        for receiver in self.receivers {
            join_logged("receive", receiver);
        }
        info!(target: "engine", "Scoreboard shutdown complete");
    }
}

fn join_logged(name: &str, handle: thread::JoinHandle<()>) {
    match handle.join() {
        Ok(()) => debug!(target: "engine", "{} thread terminated cleanly", name),
        Err(e) => error!(target: "engine", "{} thread panicked: {:?}", name, e),
    }
}

//=========================================================================
// Unit Tests
//=========================================================================
