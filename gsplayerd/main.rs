mod dbus;

use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming};
use gsplayer::{App, Config, Player};
use log::{error, info};
use tokio::fs;
use tokio::sync::watch;
use tokio::task;

#[tokio::main]
async fn main() -> Result<(), App> {
    let config_dir = Config::config_dir()?;
    let log_dir = config_dir.join("logs");

    // Ensure the log directory exists
    fs::create_dir_all(&log_dir).await?;

    let config = Config::load(&config_dir.join("config.toml")).await?;

    // Logger setup
    let _logger = Logger::try_with_str(&config.log_level)?
        .log_to_file(FileSpec::default().directory(&log_dir))
        .rotate(
            Criterion::Size(1_000_000),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(3),
        )
        .duplicate_to_stderr(Duplicate::Warn)
        .start()?;

    let player = Player::spawn(&config)?;
    info!("Player started");

    let (stop_sender, stop_receiver) = watch::channel(());
    task::spawn({
        let player = player.clone();
        let stop_sender = stop_sender.clone();
        async move {
            if let Err(e) = dbus::run_dbus_server(player, stop_sender.clone()).await {
                error!("DBus listener error: {}", e);
                let _ = stop_sender.send(());
            }
        }
    });

    wait_for_stop_signal(stop_receiver).await;
    player.quit();
    info!("gsplayerd exiting");
    Ok(())
}

async fn wait_for_stop_signal(mut stop_receiver: watch::Receiver<()>) {
    tokio::select! {
        _ = stop_receiver.changed() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }
}
