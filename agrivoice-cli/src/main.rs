mod repl;

use agrivoice_core::{IncomingMessage, MessageKind, Notice, NoticeLevel, SessionEvent};
use agrivoice_engine::assistant::VoiceAssistant;
use agrivoice_engine::traits::{Notifier, VoiceSession};
use agrivoice_runtime::config_store::{ConfigStore, apply_env_overrides};
use agrivoice_runtime::defaults::{DEFAULT_CONFIG_FILE, default_app_config};
use agrivoice_runtime::files::select_image;
use agrivoice_runtime::microphone::SystemMicrophone;
use agrivoice_runtime::secrets::{KeyringTokenSource, TokenStore};
use agrivoice_runtime::voice::RealtimeVoiceSession;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use repl::{Command, HELP, parse_line};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinSet;

#[derive(Debug, Parser)]
#[command(name = "agrivoice", about = "Voice assistant for crop disease checks")]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Open the assistant and drive it from the prompt.
    Call,
    /// Store the farm API session token in the OS keyring.
    Login {
        /// Read from stdin when omitted.
        #[arg(long)]
        token: Option<String>,
    },
    /// Remove the stored session token.
    Logout,
    /// Write a config file with default values.
    InitConfig {
        #[arg(long)]
        force: bool,
    },
}

struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn notify(&self, notice: Notice) {
        let desc = notice
            .description
            .as_deref()
            .map(|d| format!(": {d}"))
            .unwrap_or_default();
        match notice.level {
            NoticeLevel::Info => println!("[info] {}{desc}", notice.title),
            NoticeLevel::Error => eprintln!("[error] {}{desc}", notice.title),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = ConfigStore::at_path(&cli.config);

    match cli.command {
        CliCommand::Call => run_call(&store).await,
        CliCommand::Login { token } => login(token).await,
        CliCommand::Logout => {
            TokenStore::user().clear()?;
            println!("Signed out.");
            Ok(())
        }
        CliCommand::InitConfig { force } => {
            if store.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    store.path().display()
                );
            }
            store.save(&default_app_config())?;
            println!("Wrote {}", store.path().display());
            Ok(())
        }
    }
}

async fn login(token: Option<String>) -> anyhow::Result<()> {
    let token = match token {
        Some(t) => t,
        None => {
            println!("Paste session token:");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            lines
                .next_line()
                .await
                .context("read token")?
                .unwrap_or_default()
        }
    };
    TokenStore::user().save(&token)?;
    println!("Signed in.");
    Ok(())
}

async fn run_call(store: &ConfigStore) -> anyhow::Result<()> {
    let mut cfg = store.load_or_default()?;
    apply_env_overrides(&mut cfg, |k| std::env::var(k).ok());

    let voice = Arc::new(RealtimeVoiceSession::new(cfg.voice.ws_url.clone()));
    let transcript = tokio::spawn(print_messages(voice.subscribe()));

    let assistant = Arc::new(
        VoiceAssistant::mount(
            &cfg,
            voice,
            Arc::new(SystemMicrophone::new()),
            Arc::new(KeyringTokenSource::new(TokenStore::user())),
            Arc::new(StdoutNotifier),
        )
        .await,
    );

    println!("{HELP}");
    let mut uploads = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("read command")? {
        let cmd = match parse_line(&line) {
            Ok(Some(c)) => c,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        // Errors were already shown as notices; the prompt keeps going.
        match cmd {
            Command::Start => {
                let _ = assistant.start_call().await;
            }
            Command::Stop => {
                let _ = assistant.stop_call().await;
            }
            Command::Upload(path) => {
                let image = match select_image(&path) {
                    Ok(i) => i,
                    Err(e) => {
                        StdoutNotifier.notify(Notice::from_error(&e));
                        continue;
                    }
                };
                // Runs alongside the prompt so the call stays usable.
                let assistant = assistant.clone();
                uploads.spawn(async move {
                    if let Ok(outcome) = assistant.submit_image(image).await {
                        log::info!("upload finished: {outcome:?}");
                    }
                });
            }
            Command::Status => {
                let status = assistant.status().await;
                println!("{}", status_line(&status));
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    uploads.abort_all();
    while uploads.join_next().await.is_some() {}
    transcript.abort();

    match Arc::try_unwrap(assistant) {
        Ok(assistant) => assistant.unmount().await,
        Err(assistant) => {
            let _ = assistant.stop_call().await;
        }
    }
    Ok(())
}

fn status_line(status: &agrivoice_engine::session::SessionStatus) -> String {
    let upload = status
        .upload
        .as_ref()
        .map(|u| format!("{} ({:?})", u.file_name, u.status))
        .unwrap_or_else(|| "none".into());
    format!(
        "phase={:?} session={} upload_prompt={} upload={upload} last_end={:?}",
        status.phase, status.generation, status.upload_visible, status.last_end
    )
}

/// Finished turns only; partial transcripts would flood the prompt.
fn transcript_line(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Message(IncomingMessage {
            role,
            text,
            kind: MessageKind::Message,
        }) => Some(format!("{role:?}: {text}")),
        _ => None,
    }
}

async fn print_messages(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = transcript_line(&event) {
                    println!("{line}");
                }
            }
            Err(RecvError::Lagged(n)) => log::warn!("transcript skipped {n} voice events"),
            Err(RecvError::Closed) => break,
        }
    }
}
