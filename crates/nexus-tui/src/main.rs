use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use nexus_core::{
    config::{Config, BACKEND_URL_ENV},
    BackendClient, ChatRole, Controller, HealthMonitor, HealthStatus, Notice, NoticeLevel,
    UploadFile,
};
use tracing::info;

mod app;
mod handler;
mod logging;
mod markdown;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "nexus")]
#[command(version, about = "Chat with your documents through a Nexus backend")]
struct Cli {
    /// Backend origin, e.g. http://127.0.0.1:8000 (overrides NEXUS_BACKEND_URL and the config file)
    #[arg(short, long, global = true)]
    backend: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat screen (default)
    Chat,
    /// Poll the backend until it reports healthy or retries run out
    Health {
        /// Number of attempts before giving up
        #[arg(short, long)]
        retries: Option<u32>,
    },
    /// Upload one file and optionally ask questions about it
    Upload {
        /// File to ingest (PDF, DOCX, TXT, PNG, JPEG or WEBP)
        path: PathBuf,
        /// Question to ask once the upload succeeds (repeatable)
        #[arg(short, long)]
        ask: Vec<String>,
    },
    /// Show the resolved configuration
    Config {
        /// Persist the resolved backend URL to the config file
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("{} {}", "Ignoring unreadable config:".yellow(), e);
        Config::new()
    });
    let base_url = config.resolve_backend_url(cli.backend.as_deref());

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_tui(&config, &base_url).await,
        Commands::Health { retries } => {
            logging::init_stderr_logging();
            run_health(&config, &base_url, retries).await
        }
        Commands::Upload { path, ask } => {
            logging::init_stderr_logging();
            run_upload(&config, &base_url, path, &ask).await
        }
        Commands::Config { save } => show_config(&config, &base_url, save),
    }
}

async fn run_tui(config: &Config, base_url: &str) -> Result<()> {
    let _log_guard = logging::init_file_logging()?;
    info!(backend = %base_url, "starting chat screen");

    let client = BackendClient::from_config(config, base_url);
    let controller = Controller::new(client);
    let monitor = HealthMonitor::from_config(config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let mut app = App::new(controller, monitor, events.sender());
    app.start_background();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    info!("chat screen closed");
    result
}

async fn run_health(config: &Config, base_url: &str, retries: Option<u32>) -> Result<()> {
    let client = BackendClient::from_config(config, base_url);
    let mut monitor = HealthMonitor::from_config(config);
    if let Some(retries) = retries {
        monitor.retries = retries.max(1);
    }

    println!("🔌 Checking {}", base_url.cyan());
    let total = monitor.retries;
    let status = monitor
        .run(&client, |attempt| {
            println!("   {} {}/{}", "attempt".dimmed(), attempt, total);
        })
        .await;

    match status {
        HealthStatus::Online => println!("{}", "● Server Online".green().bold()),
        _ => {
            println!("{}", "● Offline".red().bold());
            anyhow::bail!("Backend at {} did not become healthy", base_url);
        }
    }
    Ok(())
}

async fn run_upload(config: &Config, base_url: &str, path: PathBuf, questions: &[String]) -> Result<()> {
    let client = BackendClient::from_config(config, base_url);
    let mut controller = Controller::new(client);

    let file = UploadFile::from_path(&path);
    println!("📤 Uploading {} to {}", file.name.bold(), base_url.cyan());

    let uploaded = controller.upload(&file).await;
    print_notices(controller.drain_notices());
    if !uploaded {
        anyhow::bail!("Upload of {} failed", path.display());
    }

    if let Some(confirmation) = controller.transcript().last() {
        println!("\n{}", confirmation.content);
    }
    if let Some(info) = controller.session().files().last() {
        let chunks = info
            .chunks
            .map(|c| format!(", {} chunks", c))
            .unwrap_or_default();
        println!(
            "{}",
            format!(
                "session {} ({}{})",
                controller.session().session_id().unwrap_or_default(),
                info.modality.as_str(),
                chunks
            )
            .dimmed()
        );
    }

    for question in questions {
        println!("\n{} {}", "You:".cyan().bold(), question);
        let answered = controller.ask(question).await;
        print_notices(controller.drain_notices());

        let reply = controller
            .transcript()
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Assistant);
        if let Some(reply) = reply {
            let label = if answered { "Nexus:".yellow().bold() } else { "Nexus:".red().bold() };
            println!("{} {}", label, reply.content);
        }
    }

    Ok(())
}

fn print_notices(notices: Vec<Notice>) {
    for notice in notices {
        let line = match notice.level {
            NoticeLevel::Info => notice.text.normal(),
            NoticeLevel::Warning => notice.text.yellow(),
            NoticeLevel::Error => notice.text.red(),
        };
        eprintln!("{}", line);
    }
}

fn show_config(config: &Config, base_url: &str, save: bool) -> Result<()> {
    let path = Config::get_config_path()?;

    println!("{}", "⚙️  Nexus configuration".bold().blue());
    println!("  {:<22} {}", "config file".dimmed(), path.display());
    println!("  {:<22} {}", "backend url".dimmed(), base_url.cyan());
    println!("  {:<22} {}", "health retries".dimmed(), config.health_retries());
    println!(
        "  {:<22} {} ms",
        "health retry delay".dimmed(),
        config.health_retry_delay().as_millis()
    );
    println!(
        "  {:<22} {} s",
        "upload timeout".dimmed(),
        config.upload_timeout().as_secs()
    );
    println!(
        "  {:<22} {} s",
        "query timeout".dimmed(),
        config.query_timeout().as_secs()
    );
    if let Ok(dir) = logging::log_dir() {
        println!("  {:<22} {}", "log directory".dimmed(), dir.display());
    }
    if std::env::var(BACKEND_URL_ENV).is_ok() {
        println!(
            "  {}",
            format!("({} is set)", BACKEND_URL_ENV).dimmed()
        );
    }

    if save {
        Config::save_backend_url(base_url)?;
        println!("{} {}", "✓ Saved backend url to".green(), path.display());
    }

    Ok(())
}
