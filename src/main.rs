//=========================================================================
// on_deck CLI
//=========================================================================
//
// Usage:
//   on_deck [--config PATH] [--verbose] demo --replay FILE [--interval-ms N]
//   on_deck display
//   on_deck settings [--mode M] [--brightness B] [--delay D] [--focus-id N]
//   on_deck patch INDEX JSON
//   on_deck reset
//   on_deck games
//
//=========================================================================

//=== External Dependencies ===============================================

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Deserialize;

//=== Internal Dependencies ===============================================

use on_deck::config::{ScoreboardConfig, Transport};
use on_deck::control::{Controller, SettingsChange};
use on_deck::core::bus::{Bus, SnapshotStore};
use on_deck::core::patch::Tree;
use on_deck::display::{FrameBuffer, SharedFrameBuffer};
use on_deck::producer::Producer;
use on_deck::{Error, Result, ScoreboardBuilder};

//=== Arguments ===========================================================

#[derive(Parser, Debug)]
#[command(name = "on_deck")]
#[command(about = "Live game state on an LED pixel matrix")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay recorded game states through an in-process bus and display
    Demo {
        /// JSON-lines file of {"index": N | "focus", "state": {...}}
        #[arg(long)]
        replay: PathBuf,

        /// Pause between replayed lines
        #[arg(long, default_value = "500")]
        interval_ms: u64,
    },

    /// Run the display process
    Display,

    /// Show or change settings
    Settings {
        #[arg(long)]
        mode: Option<String>,
        #[arg(long)]
        brightness: Option<String>,
        /// Seconds, or p<N> / m<N> to adjust the current delay
        #[arg(long, allow_hyphen_values = true)]
        delay: Option<String>,
        #[arg(long)]
        focus_id: Option<String>,
    },

    /// Merge a JSON patch into a game ("focus" for the focus game)
    Patch { target: PatchTarget, json: String },

    /// Hide every game on every display
    Reset,

    /// Print every tracked game snapshot
    Games,
}

#[derive(Debug, Clone, Copy)]
enum PatchTarget {
    Game(usize),
    Focus,
}

impl std::str::FromStr for PatchTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "focus" => Ok(PatchTarget::Focus),
            other => other
                .parse()
                .map(PatchTarget::Game)
                .map_err(|_| format!("{other:?} is neither a game index nor \"focus\"")),
        }
    }
}

//=== main() ==============================================================

fn main() -> ExitCode {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => ScoreboardConfig::from_file(path)?,
        None => ScoreboardConfig::default(),
    };

    if let Command::Demo { replay, interval_ms } = &args.command {
        return demo(&config, replay, Duration::from_millis(*interval_ms));
    }

    if config.bus.transport == Transport::Local {
        warn!(target: "engine", "Local transport only reaches this process; set [bus] transport = \"redis\"");
    }
    let (bus, snapshots) = config.bus.connect()?;
    let controller = Controller::new(bus.clone(), snapshots.clone());

    match args.command {
        Command::Demo { .. } => Ok(()),
        Command::Display => ScoreboardBuilder::from_config(&config, bus, snapshots)?.build().run(),
        Command::Settings {
            mode,
            brightness,
            delay,
            focus_id,
        } => {
            let change = SettingsChange {
                mode,
                brightness,
                delay,
                focus_id,
            };
            let settings = if change == SettingsChange::default() {
                controller.settings()?
            } else {
                controller.apply_settings(&change)?
            };
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(())
        }
        Command::Patch { target, json } => {
            let patch = match target {
                PatchTarget::Game(index) => controller.apply_patch(index, &json)?,
                PatchTarget::Focus => controller.apply_focus_patch(&json)?,
            };
            println!("{}", patch.to_json());
            Ok(())
        }
        Command::Reset => controller.reset(),
        Command::Games => {
            for (index, game) in controller.games()? {
                println!("{} {}", index, serde_json::Value::Object(game));
            }
            Ok(())
        }
    }
}

//=== demo ================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayTarget {
    Game(usize),
    Named(String),
}

#[derive(Debug, Deserialize)]
struct ReplayLine {
    index: ReplayTarget,
    state: Tree,
}

fn demo(config: &ScoreboardConfig, replay: &PathBuf, interval: Duration) -> Result<()> {
    let (initial, rest) = split_session(read_replay(replay)?, config.store.capacity)?;
    let bus: Arc<dyn Bus> = Arc::new(on_deck::core::bus::LocalBus::new());
    let snapshots: Arc<dyn SnapshotStore> = Arc::new(on_deck::core::bus::MemoryStore::new());

    let frame = SharedFrameBuffer::new(FrameBuffer::new(
        config.matrix.width,
        config.matrix.height,
        config.matrix.backend,
    ));
    let handle = ScoreboardBuilder::from_config(config, bus.clone(), snapshots.clone())?
        .with_canvas(Box::new(frame.clone()))
        .build()
        .start()?;

    //--- Producer thread: first state per game opens the session --------
    let producer = thread::Builder::new().name("producer".into()).spawn(move || -> Result<()> {
        let mut producer = Producer::new(bus, snapshots);
        producer.initialize(&initial)?;

        for line in rest {
            thread::sleep(interval);
            match line.index {
                ReplayTarget::Game(index) => producer.update(index, &line.state)?,
                ReplayTarget::Named(name) if name == "focus" => producer.update_focus(&line.state)?,
                ReplayTarget::Named(name) => {
                    warn!(target: "producer", "Skipping replay line for {:?}", name);
                    None
                }
            };
        }
        Ok(())
    })?;

    let replayed = match producer.join() {
        Ok(result) => result,
        Err(_) => {
            error!(target: "engine", "producer thread panicked");
            Ok(())
        }
    };
    thread::sleep(interval);

    let settings = handle.settings();
    handle.shutdown();
    replayed?;

    let settings = settings?;
    let frame = frame.lock();
    info!(
        target: "engine",
        "Replay finished: {} games visible, {} frames presented, {} lit pixels",
        settings.visible_count,
        frame.swap_count(),
        frame.lit_pixels()
    );
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// Splits replay lines into the session's opening states (the first line
/// for each game) and the updates replayed after it.
///
/// Game indices must fit the configured slot count and cover `0..N`
/// without gaps; a missing game would otherwise open as an empty entity.
fn split_session(lines: Vec<ReplayLine>, capacity: usize) -> Result<(Vec<Tree>, Vec<ReplayLine>)> {
    let mut initial: Vec<Option<Tree>> = Vec::new();
    let mut rest = Vec::new();

    for line in lines {
        match line.index {
            ReplayTarget::Game(index) if index >= capacity => {
                return Err(Error::UnknownGame { index, tracked: capacity });
            }
            ReplayTarget::Game(index) if initial.get(index).map_or(true, Option::is_none) => {
                if index >= initial.len() {
                    initial.resize(index + 1, None);
                }
                initial[index] = Some(line.state);
            }
            _ => rest.push(line),
        }
    }

    let initial = initial
        .into_iter()
        .enumerate()
        .map(|(index, state)| {
            state.ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, format!("replay has no state for game {index}")).into()
            })
        })
        .collect::<Result<Vec<Tree>>>()?;
    Ok((initial, rest))
}

fn read_replay(path: &PathBuf) -> Result<Vec<ReplayLine>> {
    let text = fs::read_to_string(path)?;
    let mut lines = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ReplayLine>(line) {
            Ok(parsed) => lines.push(parsed),
            Err(e) => warn!(target: "producer", "{}:{}: {}", path.display(), number + 1, e),
        }
    }
    Ok(lines)
}

//=========================================================================
// Unit Tests
//=========================================================================
