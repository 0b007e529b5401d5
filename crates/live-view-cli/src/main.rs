use std::io::BufRead;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use live_view_client::{ClientEvent, ClientHandle, LiveViewClient, RunningClient};
use live_view_core::config::{Config, LoggingConfig};
use live_view_core::endpoint::derive_endpoint_str;
use live_view_core::HtmlDocument;

#[derive(Parser)]
#[command(
    name = "live-view",
    about = "Keep a page's live regions in sync with a live view server",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the connection endpoint derived from a page URL
    Endpoint {
        /// Page location, e.g. http://localhost:4000/dashboard
        page_url: String,
    },

    /// Load a page and keep it in sync with the server
    Connect {
        /// Page location the endpoint is derived from
        #[arg(long)]
        url: String,

        /// HTML file holding the page markup
        #[arg(long)]
        page: PathBuf,

        /// Print the final document when the connection ends
        #[arg(long)]
        dump: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Check configuration for errors
    Validate,
}

/// A line typed on stdin while connected.
#[derive(Debug, PartialEq, Eq)]
enum StdinCommand {
    /// Click the element whose `id` attribute matches.
    Click(String),
    Rediscover,
    Html,
    Quit,
}

fn parse_stdin_command(line: &str) -> Option<StdinCommand> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    match cmd {
        "click" => parts.next().map(|id| StdinCommand::Click(id.to_string())),
        "rediscover" => Some(StdinCommand::Rediscover),
        "html" => Some(StdinCommand::Html),
        "quit" | "exit" => Some(StdinCommand::Quit),
        _ => None,
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose {
        "debug".to_string()
    } else {
        logging.level.clone().unwrap_or_else(|| "info".to_string())
    };
    let directives = std::iter::once(level)
        .chain(logging.filters.iter().cloned())
        .collect::<Vec<_>>()
        .join(",");

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directives));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (logging.format.as_str(), logging.output.as_str()) {
        ("json", "stdout") => builder.json().with_writer(std::io::stdout).init(),
        ("json", _) => builder.json().with_writer(std::io::stderr).init(),
        (_, "stdout") => builder.with_writer(std::io::stdout).init(),
        _ => builder.with_writer(std::io::stderr).init(),
    }
}

/// Forward stdin commands to the running client until EOF or `quit`.
///
/// Runs on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_stdin_reader(handle: ClientHandle<HtmlDocument>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_stdin_command(&line) {
                Some(StdinCommand::Click(id)) => {
                    handle.click_by(move |doc: &HtmlDocument| doc.element_by_id(&id));
                }
                Some(StdinCommand::Rediscover) => {
                    handle.rediscover();
                }
                Some(StdinCommand::Html) => {
                    handle.with_document(|doc: &HtmlDocument| println!("{}", doc.to_html()));
                }
                Some(StdinCommand::Quit) => {
                    handle.shutdown();
                    break;
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("unknown command: {line} (try: click <id>, rediscover, html, quit)"),
            }
        }
    });
}

fn print_event(event: &ClientEvent) {
    match event {
        ClientEvent::Opened { subscriptions } => println!("open ({subscriptions} subscriptions)"),
        ClientEvent::Rendered { id, regions } => println!("render {id}: {regions} region(s)"),
        ClientEvent::Malformed { error } => eprintln!("malformed frame: {error}"),
        ClientEvent::Sent(msg) => match msg.to_json() {
            Ok(json) => println!("sent {json}"),
            Err(e) => eprintln!("unprintable frame: {e}"),
        },
        ClientEvent::Closed { reason } => println!("closed: {reason}"),
    }
}

async fn connect(config: &Config, url: &str, page: &Path, dump: bool) -> anyhow::Result<()> {
    let markup = std::fs::read_to_string(page)?;
    let doc = HtmlDocument::parse(&markup)?;

    let client = LiveViewClient::new(doc, config.protocol.clone());
    tracing::info!(session_id = %client.session_id(), page = %page.display(), "Starting live view client");

    let RunningClient {
        handle,
        mut events,
        task,
    } = client.connect(url).await?;

    spawn_stdin_reader(handle.clone());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    print_event(&event);
                    if matches!(event, ClientEvent::Closed { .. }) {
                        break;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                handle.shutdown();
            }
        }
    }

    let doc = task.await?;
    if dump {
        println!("{}", doc.to_html());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(Config::config_path);
    let config = Config::load(&config_path)?;

    init_logging(&config.logging(), cli.verbose);

    match cli.command {
        Commands::Endpoint { page_url } => {
            let endpoint = derive_endpoint_str(&page_url, &config.protocol.endpoint_path)?;
            println!("{endpoint}");
        }
        Commands::Connect { url, page, dump } => {
            let errors = config.validate();
            if !errors.is_empty() {
                anyhow::bail!("Invalid config: {}", errors.join("; "));
            }
            connect(&config, &url, &page, dump).await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let json = serde_json::to_string_pretty(&config)?;
                println!("{json}");
            }
            ConfigAction::Validate => {
                let errors = config.validate();
                if errors.is_empty() {
                    println!("Config OK: {}", config_path.display());
                } else {
                    for e in &errors {
                        eprintln!("error: {e}");
                    }
                    anyhow::bail!("{} config error(s)", errors.len());
                }
            }
        },
    }

    Ok(())
}
