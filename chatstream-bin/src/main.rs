use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chatstream_core::{
    CancelHandle, ChatClient, ChatOptions, ChatStreamError, HistoryMessage,
    config::Config,
    model::ContentPart,
    normalizer::normalize_messages,
};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Stream chat completions from an OpenAI-compatible endpoint", long_about = None)]
struct Cli {
    /// Config file (JSON or TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Endpoint base URL; overrides the config file
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a chat completion (prints deltas live)
    Chat {
        #[arg(long)]
        model: Option<String>,
        #[arg(short, long, help = "Message from the user")]
        message: String,
        #[arg(long, help = "System prompt")]
        system: Option<String>,
        #[arg(long = "image", help = "Image URL attached to the user message")]
        images: Vec<String>,
        #[arg(long, help = "JSON file with prior messages")]
        history: Option<PathBuf>,
        #[arg(long)]
        temperature: Option<f32>,
        #[arg(long, help = "Cancel the request after this many milliseconds")]
        timeout_ms: Option<u64>,
    },
    /// Print the request body that would be sent for a history file
    Normalize {
        #[arg(long)]
        history: PathBuf,
        #[arg(long)]
        model: Option<String>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::from_path(path).with_context(|| format!("loading {}", path.display()))?,
        None => Config::for_base_url("http://127.0.0.1:8080"),
    };
    if let Some(url) = &cli.base_url {
        cfg.endpoint.base_url = url.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn read_history(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn history_entries(raw: &Value, path: &Path) -> anyhow::Result<Vec<HistoryMessage>> {
    let entries = raw
        .as_array()
        .with_context(|| format!("{}: expected a JSON array of messages", path.display()))?;
    Ok(entries.iter().filter_map(HistoryMessage::from_value).collect())
}

fn pick_model(flag: Option<String>, cfg: &Config) -> anyhow::Result<String> {
    flag.or_else(|| cfg.defaults.model.clone())
        .context("no model given: pass --model or set defaults.model in the config")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli)?;

    match cli.command {
        Commands::Chat {
            model,
            message,
            system,
            images,
            history,
            temperature,
            timeout_ms,
        } => {
            let model = pick_model(model, &cfg)?;
            let mut messages: Vec<HistoryMessage> = Vec::new();
            if let Some(system) = system {
                messages.push(HistoryMessage::new("system", system));
            }
            if let Some(path) = history {
                let raw = read_history(&path)?;
                messages.extend(history_entries(&raw, &path)?);
            }
            let user = if images.is_empty() {
                Value::String(message)
            } else {
                let mut parts = vec![ContentPart::text(message)];
                parts.extend(images.into_iter().map(ContentPart::image_url));
                serde_json::to_value(parts)?
            };
            messages.push(HistoryMessage::new("user", user));

            let client = ChatClient::from_config(&cfg)?;
            let cancel = CancelHandle::new();
            let signal = cancel.signal();
            let cancel_task = tokio::spawn(async move {
                let deadline = async {
                    match timeout_ms {
                        Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                        None => std::future::pending::<()>().await,
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
                    _ = deadline => tracing::info!("timed out"),
                }
                cancel.cancel();
            });

            let mut stream = client.stream(&model, &messages, Some(signal), ChatOptions { temperature });
            let mut saw_delta = false;
            let mut outcome = Ok(());
            while let Some(item) = stream.next().await {
                match item {
                    Ok(chunk) => {
                        if let Some(reasoning) = &chunk.reasoning_content {
                            eprint!("{reasoning}");
                        }
                        if !chunk.content.is_empty() {
                            saw_delta = true;
                            print!("{}", chunk.content);
                            io::stdout().flush().ok();
                        }
                    }
                    Err(ChatStreamError::Cancelled) => {
                        eprintln!("\n[cancelled]");
                    }
                    Err(err) => outcome = Err(err),
                }
            }
            if saw_delta {
                println!();
            }
            cancel_task.abort();
            outcome?;
        }
        Commands::Normalize { history, model } => {
            let model = model.or_else(|| cfg.defaults.model.clone()).unwrap_or_default();
            let entries = history_entries(&read_history(&history)?, &history)?;
            let messages = normalize_messages(&entries);
            let req = chatstream_core::model::ChatRequest::streaming(
                model,
                messages,
                ChatOptions {
                    temperature: cfg.defaults.temperature,
                },
            );
            println!("{}", serde_json::to_string_pretty(&req)?);
        }
    }

    Ok(())
}
