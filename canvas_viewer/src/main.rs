use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;

use canvas_core::{load_canvas_config_from_env, CanvasConfig};
use clap::Parser;
use color_eyre::Result;
use tokio::sync::mpsc::unbounded_channel;
use tracing::info;

mod app;
mod net;
mod surface;
mod ui;

use app::ViewerApp;
use net::{run_connection_manager, ChannelTransport};

#[derive(Clone)]
struct ChannelWriter {
    sender: Sender<String>,
}

impl std::io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = String::from_utf8(buf.to_vec()) {
            let _ = self.sender.send(text);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal viewer for a shared pixel canvas", long_about = None)]
struct Cli {
    /// Address of the canvas server's update stream. Overrides the config.
    #[arg(long)]
    endpoint: Option<String>,
    /// Canvas config JSON. Defaults to `CANVAS_CONFIG_PATH`, then the builtin copy.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Screen pixels per grid cell at zoom 1.0.
    #[arg(long)]
    cell_size: Option<f64>,
    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn resolve_config(cli: &Cli) -> Result<Arc<CanvasConfig>> {
    let base = match &cli.config {
        Some(path) => {
            let config = CanvasConfig::from_file(path)?;
            info!(path = %path.display(), "canvas_config.loaded=cli");
            Arc::new(config)
        }
        None => load_canvas_config_from_env().0,
    };
    if cli.endpoint.is_none() && cli.cell_size.is_none() {
        return Ok(base);
    }
    let mut config = (*base).clone();
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    if let Some(cell_size) = cli.cell_size {
        config.cell_size = cell_size;
    }
    config.validate()?;
    Ok(Arc::new(config))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let (log_tx, log_rx) = mpsc::channel::<String>();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .compact()
        .with_writer(move || ChannelWriter {
            sender: log_tx.clone(),
        })
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&*config)?);
        return Ok(());
    }
    info!(endpoint = %config.endpoint, "viewer.starting");

    let (command_tx, command_rx) = unbounded_channel();
    let (event_tx, event_rx) = unbounded_channel();
    let manager = tokio::spawn(run_connection_manager(command_rx, event_tx));

    let transport = ChannelTransport::new(command_tx);
    let ui = tokio::task::spawn_blocking(move || -> Result<()> {
        let app = ViewerApp::new(config, transport, event_rx, log_rx)?;
        app.run()
    });
    let result = ui.await?;

    // The session owned the last command sender; the manager drains and stops.
    manager.await?;
    result
}
