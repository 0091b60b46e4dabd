//! Terminal front end for the SmartNotes popup.
//!
//! Each subcommand is one popup action. Download progress and streamed
//! chunks are printed as they arrive.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use smartnotes_capability::ContentFormat;
use smartnotes_events::{event_names, EventBusRef, FnEventBus, IncomingSelection, RuntimeMessage};
use smartnotes_orchestrator::Outcome;
use smartnotes_popup::{PopupConfig, PopupController};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "smartnotes", author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the database (defaults to the platform data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use the mock backends for this run without saving the setting
    #[arg(long, global = true)]
    mock: bool,

    /// Print results as text only, without HTML rendering
    #[arg(long, global = true)]
    no_render: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize text
    Summarize {
        text: Option<String>,
        /// Ask for a markdown summary
        #[arg(long)]
        markdown: bool,
    },
    /// Translate text
    Translate {
        text: Option<String>,
        #[arg(long, default_value = "auto")]
        from: String,
        #[arg(long, default_value = "fr")]
        to: String,
    },
    /// Rewrite text
    Rewrite {
        text: Option<String>,
        #[arg(long)]
        tone: Option<String>,
        #[arg(long)]
        stream: bool,
    },
    /// Write new text from a prompt
    Write {
        text: Option<String>,
        #[arg(long)]
        tone: Option<String>,
        #[arg(long)]
        length: Option<String>,
        #[arg(long)]
        stream: bool,
    },
    /// Proofread text and list the corrections
    Proofread {
        text: Option<String>,
        /// Expected input language
        #[arg(long, default_value = "en")]
        lang: String,
    },
    /// Detect the language of text
    Detect { text: Option<String> },
    /// Run a prompt against the prompt model
    Prompt {
        text: Option<String>,
        #[arg(long)]
        stream: bool,
        #[arg(long)]
        temperature: Option<f64>,
        #[arg(long)]
        top_k: Option<u32>,
        /// Create a session first and run the prompt inside it
        #[arg(long)]
        session: bool,
    },
    /// Manage saved notes
    Notes {
        #[command(subcommand)]
        command: NotesCommand,
    },
    /// Save a result as a note
    Save {
        content: String,
        /// Selection the result came from
        #[arg(long, default_value = "")]
        source: String,
    },
    /// Turn mock mode on or off
    Mock { state: Toggle },
    /// Forget cached availability results
    ClearCaches,
    /// Process a selection message as the content script sends it
    Selection { json: String },
}

#[derive(Subcommand)]
enum NotesCommand {
    List,
    Delete { id: Uuid },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

/// Bus that prints events to the terminal. Chunks go to stdout as they
/// stream in; everything else goes to stderr.
fn printing_bus() -> EventBusRef {
    let streamed = AtomicBool::new(false);
    Arc::new(FnEventBus::new(
        move |topic: &str, payload: &serde_json::Value| match topic {
            event_names::DOWNLOAD_PROGRESS => {
                eprintln!(
                    "Downloading {} model: {}%",
                    payload["capability"].as_str().unwrap_or_default(),
                    payload["percent"]
                );
            }
            event_names::RESULT_CHUNK => {
                streamed.store(true, Ordering::Relaxed);
                print!("{}", payload["chunk"].as_str().unwrap_or_default());
                let _ = std::io::stdout().flush();
            }
            event_names::RESULT_COMPLETED => {
                if streamed.swap(false, Ordering::Relaxed) {
                    println!();
                } else {
                    match &payload["payload"] {
                        serde_json::Value::String(text) => println!("{text}"),
                        value => println!(
                            "{}",
                            serde_json::to_string_pretty(value).unwrap_or_default()
                        ),
                    }
                }
                if let Some(html) = payload["rendered"].as_str() {
                    eprintln!("html: {html}");
                }
                if payload["fallback"].as_bool().unwrap_or(false) {
                    eprintln!("(local fallback, no summarizer available)");
                }
            }
            event_names::RESULT_FAILED => {
                if streamed.swap(false, Ordering::Relaxed) {
                    println!();
                }
            }
            event_names::SESSION_CHANGED => {
                eprintln!("Session {}", payload["state"].as_str().unwrap_or_default());
            }
            _ => tracing::debug!(topic, %payload, "Event"),
        },
    ))
}

/// Text from the argument, or all of stdin.
fn input_text(text: Option<String>) -> anyhow::Result<String> {
    match text {
        Some(text) => Ok(text),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read text from stdin")?;
            Ok(buf)
        }
    }
}

async fn set_source(controller: &PopupController, text: Option<String>) -> anyhow::Result<()> {
    let text = input_text(text)?;
    controller.update(|s| s.source_text = text).await;
    Ok(())
}

fn finish(outcome: Option<Outcome>) -> anyhow::Result<()> {
    match outcome {
        None => bail!("No input text"),
        Some(outcome) => match outcome.result {
            Ok(_) => Ok(()),
            Err(e) => Err(e.into()),
        },
    }
}

async fn run(controller: &PopupController, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Summarize { text, markdown } => {
            set_source(controller, text).await?;
            if markdown {
                controller
                    .update(|s| s.summarizer.format = ContentFormat::Markdown)
                    .await;
            }
            finish(controller.summarize().await)
        }
        Commands::Translate { text, from, to } => {
            set_source(controller, text).await?;
            controller
                .update(|s| {
                    s.source_language = from;
                    s.target_language = to;
                })
                .await;
            finish(controller.translate().await)
        }
        Commands::Rewrite { text, tone, stream } => {
            set_source(controller, text).await?;
            if let Some(tone) = tone {
                controller.update(|s| s.compose.tone = tone).await;
            }
            finish(controller.rewrite(stream).await)
        }
        Commands::Write {
            text,
            tone,
            length,
            stream,
        } => {
            set_source(controller, text).await?;
            controller
                .update(|s| {
                    if let Some(tone) = tone {
                        s.compose.tone = tone;
                    }
                    if let Some(length) = length {
                        s.compose.length = length;
                    }
                })
                .await;
            finish(controller.write(stream).await)
        }
        Commands::Proofread { text, lang } => {
            set_source(controller, text).await?;
            controller
                .update(|s| s.proofreader.expected_input_languages = vec![lang])
                .await;
            let Some(report) = controller.proofread().await else {
                bail!("No input text");
            };
            for (correction, excerpt) in &report.corrections {
                println!(
                    "  {:?} -> {} ({})",
                    excerpt,
                    correction
                        .replacement
                        .as_deref()
                        .or(correction.suggestions.first().map(String::as_str))
                        .unwrap_or("?"),
                    correction.explanation.as_deref().unwrap_or("no explanation")
                );
            }
            finish(Some(report.outcome))
        }
        Commands::Detect { text } => {
            set_source(controller, text).await?;
            let Some(report) = controller.detect_language().await else {
                bail!("No input text");
            };
            for detection in &report.detections {
                println!(
                    "{} {:.2}",
                    detection.detected_language, detection.confidence
                );
            }
            finish(Some(report.outcome))
        }
        Commands::Prompt {
            text,
            stream,
            temperature,
            top_k,
            session,
        } => {
            let text = input_text(text)?;
            controller
                .update(|s| {
                    s.prompt.temperature = temperature;
                    s.prompt.top_k = top_k;
                })
                .await;
            if session {
                let parameters = controller.create_session().await?;
                eprintln!(
                    "temperature={} top_k={}",
                    parameters.temperature, parameters.top_k
                );
            }
            let outcome = controller.run_prompt(Some(&text), stream).await;
            if session {
                controller.destroy_session().await;
            }
            finish(outcome?)
        }
        Commands::Notes { command } => match command {
            NotesCommand::List => {
                for note in controller.list_notes()? {
                    println!(
                        "{}  {}  {}",
                        note.id,
                        note.created_at.format("%Y-%m-%d %H:%M"),
                        note.preview(60)
                    );
                }
                Ok(())
            }
            NotesCommand::Delete { id } => {
                controller.delete_note(&id)?;
                println!("Deleted {id}");
                Ok(())
            }
        },
        Commands::Save { content, source } => {
            controller
                .update(|s| {
                    s.source_text = source;
                    s.last_output = Some(content);
                })
                .await;
            let note = controller.save_note().await?;
            println!("Saved {}", note.id);
            Ok(())
        }
        Commands::Mock { state } => {
            let enabled = matches!(state, Toggle::On);
            controller.set_mock_mode(enabled).await?;
            println!("Mock mode {}", if enabled { "on" } else { "off" });
            Ok(())
        }
        Commands::ClearCaches => {
            controller.clear_caches().await;
            println!("Caches cleared");
            Ok(())
        }
        Commands::Selection { json } => {
            let selection = match serde_json::from_str::<RuntimeMessage>(&json) {
                Ok(RuntimeMessage::TextSelected { data }) => data,
                Ok(RuntimeMessage::GetSelection) => bail!("Expected a textSelected message"),
                Err(_) => serde_json::from_str::<IncomingSelection>(&json)
                    .context("Selection is neither a message nor a selection payload")?,
            };
            if let Some(report) = controller.process_incoming(selection).await {
                if let Some(top) = report.top() {
                    println!(
                        "Detected {} ({:.2})",
                        top.detected_language, top.confidence
                    );
                }
            }
            let state = controller.state().await;
            println!("Source language: {}", state.source_language);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,smartnotes=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = PopupConfig::from_env().with_render_rich(!cli.no_render);
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    tracing::debug!(data_dir = %config.data_dir.display(), "Starting smartnotes");

    let controller = PopupController::open(&config, printing_bus())?;
    controller.initialize().await?;
    if cli.mock {
        controller.install_mocks();
    }

    run(&controller, cli.command).await
}
