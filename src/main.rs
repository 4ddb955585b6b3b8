use soundbridge::audio::{AlsaPlayerFactory, AlsaSession};
use soundbridge::bridge::{protocol, SoundService};
use soundbridge::config::Settings;
use soundbridge::coordinator::AudioCoordinator;
use soundbridge::init_app_dirs;
use soundbridge::ui::Cli;
use std::error::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_CAPACITY: usize = 128;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::new();
    let args = &cli.args;

    // stdout carries the protocol, so logs go to stderr.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("soundbridge=info"));
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config_path = cli.config_path();
    if args.config.is_none() {
        init_app_dirs()?;
    }

    let mut settings = match Settings::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            cli.display_error(&e);
            return Err(e.into());
        }
    };
    args.apply_to(&mut settings);
    settings.validate()?;
    if args.save_config {
        settings.save(&config_path)?;
        info!("Saved settings to {}", config_path.display());
    }
    info!(
        "Starting soundbridge (device={}, bundle_dir={})",
        settings.alsa_device,
        settings.bundle_dir.display()
    );

    let (events_tx, events_rx) = broadcast::channel(EVENT_CAPACITY);
    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let factory = AlsaPlayerFactory::new(&settings.alsa_device, notice_tx);
    let session = AlsaSession::new(&settings.alsa_device, settings.available_routes.clone());
    let coordinator = AudioCoordinator::new(
        Box::new(factory),
        Box::new(session),
        settings.coordinator_config(),
        events_tx.clone(),
    );

    let (mut service, command_tx) = SoundService::new(coordinator, notice_rx, events_tx, settings.service_options());
    let service_task = tokio::spawn(async move { service.run().await });

    let shutdown_tx = command_tx.clone();
    let serve = protocol::serve_stdio(command_tx, events_rx);
    tokio::select! {
        result = serve => {
            if let Err(e) = result {
                error!("Host protocol failed: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted; shutting down.");
        }
    }

    // Already stopped when the host closed its input.
    let _ = shutdown_tx.send(soundbridge::bridge::BridgeCommand::Shutdown).await;
    drop(shutdown_tx);
    if let Err(e) = service_task.await {
        error!("Sound service task failed: {}", e);
    }
    info!("soundbridge stopped.");
    Ok(())
}
