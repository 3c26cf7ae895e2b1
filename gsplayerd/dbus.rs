use gsplayer::{PlaybackState, Player};
use log::info;
use tokio::sync::watch;
use tokio::task;
use zbus::{fdo, interface, ConnectionBuilder};

pub const BUS_NAME: &str = "org.gsplayer.Player";
pub const OBJECT_PATH: &str = "/org/gsplayer/Player";

#[derive(Clone)]
pub struct PlayerDBus {
    player: Player,
    stop_signal: watch::Sender<()>,
}

impl PlayerDBus {
    /// Runs a blocking controller call off the async executor.
    async fn blocking<T, F>(&self, call: F) -> fdo::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Player) -> Option<T> + Send + 'static,
    {
        let player = self.player.clone();
        task::spawn_blocking(move || call(&player))
            .await
            .map_err(|e| fdo::Error::Failed(e.to_string()))?
            .ok_or_else(|| fdo::Error::Failed("No response from playback worker".into()))
    }

    async fn blocking_state<F>(&self, call: F) -> fdo::Result<String>
    where
        F: FnOnce(&Player) -> Option<PlaybackState> + Send + 'static,
    {
        self.blocking(call).await.map(|state| state.to_string())
    }
}

#[interface(name = "org.gsplayer.Player")]
impl PlayerDBus {
    async fn test_connection(&self) -> fdo::Result<()> {
        Ok(())
    }

    async fn queue(&self, uri: String) -> fdo::Result<String> {
        self.blocking_state(move |player| player.queue(&uri)).await
    }

    async fn play(&self) -> fdo::Result<String> {
        self.blocking_state(Player::play).await
    }

    async fn pause(&self) -> fdo::Result<String> {
        self.blocking_state(Player::pause).await
    }

    async fn stop(&self) -> fdo::Result<String> {
        self.blocking_state(Player::stop).await
    }

    async fn next(&self) -> fdo::Result<String> {
        self.blocking_state(Player::next).await
    }

    async fn mute(&self) -> fdo::Result<()> {
        self.player.mute();
        Ok(())
    }

    async fn set_volume(&self, level: f64) -> fdo::Result<()> {
        self.player.set_volume(level);
        Ok(())
    }

    async fn set_position(&self, seconds: u64) -> fdo::Result<()> {
        self.player.set_position(seconds);
        Ok(())
    }

    async fn state(&self) -> fdo::Result<String> {
        self.blocking_state(Player::state).await
    }

    async fn duration(&self) -> fdo::Result<u64> {
        self.blocking(Player::duration).await
    }

    async fn position(&self) -> fdo::Result<u64> {
        self.blocking(Player::position).await
    }

    async fn uri(&self) -> fdo::Result<String> {
        self.blocking(Player::uri).await
    }

    async fn title(&self) -> fdo::Result<String> {
        self.blocking(Player::title).await
    }

    async fn artist(&self) -> fdo::Result<String> {
        self.blocking(Player::artist).await
    }

    async fn album(&self) -> fdo::Result<String> {
        self.blocking(Player::album).await
    }

    async fn volume(&self) -> fdo::Result<f64> {
        self.blocking(Player::volume).await
    }

    async fn quit(&self) -> fdo::Result<()> {
        self.player.quit();
        self.stop_signal
            .send(())
            .map_err(|e| fdo::Error::Failed(e.to_string()))?;
        Ok(())
    }
}

pub async fn run_dbus_server(
    player: Player,
    stop_signal: watch::Sender<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    let player_dbus = PlayerDBus {
        player,
        stop_signal: stop_signal.clone(),
    };

    let _connection = ConnectionBuilder::session()?
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, player_dbus)?
        .build()
        .await?;

    let mut stop_receiver = stop_signal.subscribe();

    // Wait for the stop signal
    tokio::select! {
        _ = stop_receiver.changed() => {
            info!("Stop signal received, shutting down DBus server...");
        }
    }

    Ok(())
}
