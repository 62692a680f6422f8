use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use uuid::Uuid;

use autosave::snapshot::{GameStateSnapshot, Narrative, SessionRecord, SessionStatus, StateProvider};
use autosave::storage::FileStore;
use autosave::{AutoSaveScheduler, SaveCallbacks, SaveTriggerReason, SchedulerConfig};

#[derive(Parser, Debug)]
#[command(name = "autosave-demo", about = "Drive the auto-save scheduler from the console")]
struct Args {
    /// TOML file with scheduler settings
    #[arg(long, env = "AUTOSAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory the file store writes into
    #[arg(long, env = "AUTOSAVE_DIR", default_value = "saves")]
    save_dir: PathBuf,

    /// Session to resume; a fresh one is created when omitted
    #[arg(long)]
    session: Option<String>,
}

/// In-memory game session the console mutates and the scheduler snapshots.
struct ConsoleSession {
    state: Mutex<GameStateSnapshot>,
}

impl ConsoleSession {
    fn new(id: &str) -> Self {
        let mut state = GameStateSnapshot::new(SessionRecord::new(id, SessionStatus::Active));
        state.world = Some(json!({ "id": "demo-world", "name": "Demo World", "scene": "prologue" }));
        state.narrative = Some(Narrative::default());
        state.journal = Some(json!([]));
        Self::restore(state)
    }

    fn restore(state: GameStateSnapshot) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, GameStateSnapshot>> {
        self.state.lock().map_err(|_| anyhow!("session state lock poisoned"))
    }
}

#[async_trait]
impl StateProvider for ConsoleSession {
    async fn snapshot(&self) -> Result<GameStateSnapshot> {
        Ok(self.state()?.clone())
    }
}

enum Command {
    Choice(String),
    Scene(String),
    Save,
    Status(SessionStatus),
    Start,
    Stop,
    Stats,
    Latest,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let (word, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
        let rest = rest.trim().to_string();
        match word.to_lowercase().as_str() {
            "choice" => Some(Command::Choice(rest)),
            "scene" => Some(Command::Scene(rest)),
            "save" => Some(Command::Save),
            "pause" => Some(Command::Status(SessionStatus::Paused)),
            "resume" => Some(Command::Status(SessionStatus::Active)),
            "end" => Some(Command::Status(SessionStatus::Ended)),
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            "stats" => Some(Command::Stats),
            "latest" => Some(Command::Latest),
            "quit" | "exit" => Some(Command::Quit),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let args = Args::parse();

    // 2. Config + store
    let config = match &args.config {
        Some(path) => SchedulerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => SchedulerConfig::default(),
    };
    let store = Arc::new(FileStore::new(&args.save_dir));
    let session_id = args.session.unwrap_or_else(|| Uuid::new_v4().to_string());

    // 3. Resume from the newest save when there is one
    let session = match autosave::storage::SaveCatalog::new(store.as_ref()).latest(&session_id).await? {
        Some((key, record)) => {
            tracing::info!("Resuming session {} from {}", session_id, key);
            Arc::new(ConsoleSession::restore(record.state))
        }
        None => Arc::new(ConsoleSession::new(&session_id)),
    };

    let callbacks = SaveCallbacks::new()
        .with_save(|result| {
            println!("[SAVED] {} ({}, {} bytes, {}ms)", result.key, result.reason, result.size, result.duration);
        })
        .with_error(|failure| {
            let hint = if failure.retryable { " You can try again." } else { "" };
            println!(
                "[ERROR] {}: {}{}",
                failure.user_friendly_error.title, failure.user_friendly_error.message, hint
            );
        });

    let scheduler = AutoSaveScheduler::new(config, session.clone(), store, Arc::new(callbacks));
    scheduler.start();

    println!("Session {}", session_id);
    println!("Commands: choice <text>, scene <name>, save, pause, resume, end, start, stop, stats, latest, quit");

    // 4. Console loop
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = Command::parse(&line) else {
            println!("Unknown command: {}", line.trim());
            continue;
        };

        match command {
            Command::Choice(text) => {
                {
                    let mut state = session.state()?;
                    if let Some(narrative) = state.narrative.as_mut() {
                        narrative.entries.push(json!({ "kind": "choice", "text": text }));
                    }
                }
                scheduler.trigger_save(SaveTriggerReason::PlayerChoice).await;
            }
            Command::Scene(name) => {
                {
                    let mut state = session.state()?;
                    if let Some(world) = state.world.as_mut().and_then(|w| w.as_object_mut()) {
                        world.insert("scene".into(), json!(name));
                    }
                }
                scheduler.trigger_save(SaveTriggerReason::SceneChange).await;
            }
            Command::Save => {
                // Manual saves complete inline; the callbacks print the outcome.
                scheduler.trigger_save(SaveTriggerReason::Manual).await;
            }
            Command::Status(status) => {
                session.state()?.session.status = status;
                println!("Session is now {:?}", status);
            }
            Command::Start => scheduler.start(),
            Command::Stop => scheduler.stop(),
            Command::Stats => {
                let snap = scheduler.telemetry();
                println!(
                    "requested={} saved={} skipped={} failed={} retries={} avg={:.1}ms",
                    snap.save_stats.requested,
                    snap.save_stats.saved,
                    snap.save_stats.skipped,
                    snap.failure_stats.total,
                    snap.retry_stats.retries,
                    snap.save_stats.avg_duration_ms
                );
            }
            Command::Latest => match scheduler.load_latest(&session_id).await? {
                Some((key, record)) => {
                    let entries = record.state.narrative.map_or(0, |n| n.entries.len());
                    println!("{} (version {}, {} narrative entries)", key, record.version, entries);
                }
                None => println!("No saves yet"),
            },
            Command::Quit => break,
        }
    }

    scheduler.stop();
    tracing::info!("Demo finished");
    Ok(())
}
