use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use color_eyre::Result;
use tokio::io::AsyncBufReadExt;

use liveui::adapters::ReqwestHttpClient;
use liveui::client::{ChatClient, DEFAULT_BASE_URL};
use liveui::models::{Message, MessageRole};
use liveui::session::SessionController;
use liveui::surface::{FilePreviewSurface, RenderSurfaceManager, SurfaceId};

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "\
liveui - chat client for a generated-markup backend

USAGE:
    liveui [OPTIONS]

OPTIONS:
    --base-url <URL>     Backend base URL (default http://localhost:8000,
                         env LIVEUI_BASE_URL)
    --spool-dir <PATH>   Spool artifact handles to files under PATH
    --buffered           Use the buffered endpoint instead of streaming
    --open               Open the preview after each generated document
    --help               Show this help
    --version            Show version";

const COMMANDS: &str = "\
Commands:
    /help      Show this list
    /health    Check backend health
    /history   Print the transcript
    /open      Open the preview file in the default browser
    /fetch     Reload the current conversation from the server
    /delete    Delete the current conversation on the server
    /quit      Exit

Anything else is sent to the backend as a message.";

struct Config {
    base_url: String,
    spool_dir: Option<PathBuf>,
    buffered: bool,
    open_preview: bool,
}

fn parse_args() -> Result<Config, String> {
    let mut config = Config {
        base_url: std::env::var("LIVEUI_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        spool_dir: None,
        buffered: false,
        open_preview: false,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--base-url" => match args.next() {
                Some(value) => config.base_url = value,
                None => return Err("--base-url requires a value".to_string()),
            },
            "--spool-dir" => match args.next() {
                Some(value) => config.spool_dir = Some(PathBuf::from(value)),
                None => return Err("--spool-dir requires a value".to_string()),
            },
            "--buffered" => config.buffered = true,
            "--open" => config.open_preview = true,
            other => return Err(format!("unknown option: {}", other)),
        }
    }

    Ok(config)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("liveui=info"));
    // Logs go to stderr so the conversation on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --version and --help before any initialization
    if std::env::args().any(|arg| arg == "--version") {
        println!("liveui {}", VERSION);
        return Ok(());
    }
    if std::env::args().any(|arg| arg == "--help") {
        println!("{}", USAGE);
        return Ok(());
    }

    color_eyre::install()?;
    init_tracing();

    let config = match parse_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("Run with --help for usage.");
            std::process::exit(2);
        }
    };

    run_repl(config).await
}

async fn run_repl(config: Config) -> Result<()> {
    let http = Arc::new(ReqwestHttpClient::new());
    let client = ChatClient::new(http, config.base_url.clone());

    let mut surfaces = RenderSurfaceManager::new();
    if let Some(dir) = &config.spool_dir {
        std::fs::create_dir_all(dir)?;
        surfaces = surfaces.with_spool_dir(dir);
    }

    let preview_path = config
        .spool_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("preview.html");

    let mut controller = SessionController::new(client).with_surface_manager(surfaces);
    let preview_id = controller
        .surfaces_mut()
        .register(Box::new(FilePreviewSurface::new(&preview_path)))
        .await;

    println!("liveui {} - backend {}", VERSION, config.base_url);
    println!("Type a message to chat, /help for commands.");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !handle_command(command, &mut controller, &preview_path).await {
                break;
            }
            continue;
        }

        send_message(&mut controller, line, &config, preview_id, &preview_path).await;
    }

    Ok(())
}

/// Run one slash command. Returns `false` when the REPL should exit.
async fn handle_command(
    command: &str,
    controller: &mut SessionController,
    preview_path: &Path,
) -> bool {
    match command {
        "quit" | "exit" => return false,
        "help" => println!("{}", COMMANDS),
        "health" => match controller.client().health().await {
            Ok(health) => {
                println!(
                    "backend: {} (model: {})",
                    health.status,
                    health.model.as_deref().unwrap_or("unknown")
                );
            }
            Err(err) => eprintln!("health check failed: {}", err),
        },
        "history" => print_transcript(controller.transcript().messages()),
        "open" => {
            if preview_path.exists() {
                if let Err(err) = open::that(preview_path) {
                    eprintln!("could not open preview: {}", err);
                }
            } else {
                println!("no preview yet");
            }
        }
        "fetch" => match controller.conversation_id().map(str::to_string) {
            Some(id) => match controller.load_conversation(&id).await {
                Ok(()) => println!(
                    "reloaded {} ({} messages)",
                    id,
                    controller.transcript().len()
                ),
                Err(err) => eprintln!("fetch failed: {}", err),
            },
            None => println!("no conversation yet"),
        },
        "delete" => match controller.conversation_id().map(str::to_string) {
            Some(id) => match controller.client().delete_conversation(&id).await {
                Ok(()) => {
                    let _ = controller.reset();
                    println!("deleted {}", id);
                }
                Err(err) => eprintln!("delete failed: {}", err),
            },
            None => println!("no conversation yet"),
        },
        other => println!("unknown command: /{} (try /help)", other),
    }
    true
}

async fn send_message(
    controller: &mut SessionController,
    text: &str,
    config: &Config,
    preview_id: SurfaceId,
    preview_path: &Path,
) {
    let version_before = controller.artifact().version();

    let result = if config.buffered {
        controller.send_buffered(text).await
    } else {
        controller.send(text).await
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        return;
    }

    if let Some(reply) = controller.transcript().last() {
        println!("{}", reply.content);
    }

    if controller.artifact().version() > version_before {
        if let Some(artifact) = controller.artifact().current() {
            println!(
                "[artifact v{}, {} bytes -> {}]",
                artifact.version(),
                artifact.len(),
                preview_path.display()
            );
        }
        // The preview copies the payload during bind, so the handle is done.
        controller.surfaces_mut().mark_consumed(preview_id);

        if config.open_preview {
            if let Err(err) = open::that(preview_path) {
                eprintln!("could not open preview: {}", err);
            }
        }
    }
}

fn print_transcript(messages: &[Message]) {
    if messages.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for message in messages {
        let role = match message.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "assistant",
        };
        let marker = if message.is_artifact { " [ui]" } else { "" };
        println!("{}{}: {}", role, marker, message.content);
    }
}
