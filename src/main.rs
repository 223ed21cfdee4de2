use clap::Parser;
use serial_session::config::{Config, ConfigLoader, LogFormat};
use serial_session::{logging, DeviceHost, SessionController, SessionOptions, SystemSerialProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::signal;
use tracing::info;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Stream text from a serial device to stdout.",
    long_about = "Acquires a serial device, polls it on a fixed interval and prints the decoded UTF-8 text as it arrives. Stops at end of stream or on Ctrl+C and releases every device it opened."
)]
struct Args {
    /// Serial port name or configured alias. Defaults to the first available port.
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate.
    #[arg(short, long)]
    baud: Option<u32>,

    /// Poll interval in milliseconds.
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Keep at most this many received chunks.
    #[arg(long)]
    max_chunks: Option<usize>,

    /// Configuration file. Overrides the standard lookup.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log format: pretty, compact or json.
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// List available serial ports and exit.
    #[arg(short, long)]
    list: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = &self.port {
            config.serial.port = Some(port.clone());
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.polling.interval_ms = interval_ms;
        }
        if let Some(max_chunks) = self.max_chunks {
            config.accumulator.max_chunks = Some(max_chunks);
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    if let Some(path) = &loader.config_path {
        eprintln!("Using configuration {}", path.display());
    }
    let mut config = loader.into_config();
    args.apply(&mut config);
    config.validate()?;
    logging::init(&config.logging);

    if args.list {
        for name in SystemSerialProvider::available_ports()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let provider = match config.serial.preferred_port() {
        Some(name) => SystemSerialProvider::new(name),
        None => SystemSerialProvider::first_available(),
    };
    let host = Arc::new(DeviceHost::new(Arc::new(provider)));
    let session = SessionController::new(host, SessionOptions::from_config(&config));

    session.acquire().await?;
    session.start_reading().await?;
    info!(
        "Reading {} at {} baud",
        session.port_name().unwrap_or_default(),
        config.serial.baud_rate
    );

    let mut refresh = tokio::time::interval(session.options().poll_interval);
    let mut stdout = tokio::io::stdout();
    let mut printed = 0;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let finished = session.reading_finished();
    tokio::pin!(finished);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = &mut finished => {
                info!("Stream ended");
                break;
            }
            _ = refresh.tick() => {}
        }
        print_new(&session, &mut printed, &mut stdout).await?;
    }

    session.stop_reading().await;
    print_new(&session, &mut printed, &mut stdout).await?;

    let summary = session.release_all().await;
    if summary.failed > 0 {
        eprintln!("{} device(s) failed to close cleanly", summary.failed);
    }
    Ok(())
}

/// Write chunks not printed yet and advance `printed` past them.
async fn print_new(
    session: &SessionController,
    printed: &mut u64,
    stdout: &mut Stdout,
) -> std::io::Result<()> {
    for chunk in session.accumulator().chunks_since(*printed) {
        stdout.write_all(chunk.text.as_bytes()).await?;
        *printed = chunk.seq + 1;
    }
    stdout.flush().await
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    eprintln!("\nSignal received, releasing serial devices...");
}
