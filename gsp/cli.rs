mod error;

use clap::{Parser, Subcommand};
use error::App;
use serde::Serialize;
use zbus::{proxy, Connection};

type StdResult<T> = std::result::Result<T, App>;

#[proxy(
    interface = "org.gsplayer.Player",
    default_service = "org.gsplayer.Player",
    default_path = "/org/gsplayer/Player"
)]
trait MyPlayer {
    async fn test_connection(&self) -> zbus::Result<()>;
    async fn queue(&self, uri: &str) -> zbus::Result<String>;
    async fn play(&self) -> zbus::Result<String>;
    async fn pause(&self) -> zbus::Result<String>;
    async fn stop(&self) -> zbus::Result<String>;
    async fn next(&self) -> zbus::Result<String>;
    async fn mute(&self) -> zbus::Result<()>;
    async fn set_volume(&self, level: f64) -> zbus::Result<()>;
    async fn set_position(&self, seconds: u64) -> zbus::Result<()>;
    async fn state(&self) -> zbus::Result<String>;
    async fn duration(&self) -> zbus::Result<u64>;
    async fn position(&self) -> zbus::Result<u64>;
    async fn uri(&self) -> zbus::Result<String>;
    async fn title(&self) -> zbus::Result<String>;
    async fn artist(&self) -> zbus::Result<String>;
    async fn album(&self) -> zbus::Result<String>;
    async fn volume(&self) -> zbus::Result<f64>;
    async fn quit(&self) -> zbus::Result<()>;
}

#[derive(Parser)]
#[command(name = "gsp", about = "Control the gsplayerd daemon.", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Queue media; it plays once the player is idle")]
    Queue(QueueCommand),

    #[command(about = "Resume paused playback")]
    Play,

    #[command(about = "Pause playback")]
    Pause,

    #[command(about = "Stop playback")]
    Stop,

    #[command(about = "Skip to the next queued media")]
    Next,

    #[command(about = "Set the volume to zero")]
    Mute,

    #[command(about = "Show or set the volume")]
    Volume(VolumeCommand),

    #[command(about = "Seek to a position in seconds")]
    Seek(SeekCommand),

    #[command(about = "Show what is playing")]
    Status(StatusCommand),

    #[command(about = "Shut gsplayerd down")]
    Quit,
}

#[derive(Parser)]
struct QueueCommand {
    #[arg(required = true, help = "Media URIs or local paths")]
    uris: Vec<String>,
}

#[derive(Parser)]
struct VolumeCommand {
    #[arg(help = "New volume, 0.0 to 1.0")]
    level: Option<f64>,
}

#[derive(Parser)]
struct SeekCommand {
    #[arg(help = "Target position in seconds")]
    seconds: u64,
}

#[derive(Parser)]
struct StatusCommand {
    #[arg(short = 'j', long = "json", help = "Print as JSON")]
    json: bool,
}

/// Everything `status` reports. A field is `None` when the daemon did not answer in time.
#[derive(Serialize, Default, Debug, PartialEq)]
struct Status {
    state: Option<String>,
    uri: Option<String>,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    position: Option<u64>,
    duration: Option<u64>,
    volume: Option<f64>,
}

impl Status {
    fn render(&self) -> String {
        fn or_unknown<T: ToString>(value: Option<&T>) -> String {
            value.map_or_else(|| "unknown".to_string(), ToString::to_string)
        }

        let mut lines = vec![format!("State:    {}", or_unknown(self.state.as_ref()))];
        for (label, value) in [
            ("Title", &self.title),
            ("Artist", &self.artist),
            ("Album", &self.album),
            ("URI", &self.uri),
        ] {
            match value.as_deref() {
                Some("") => {}
                Some(text) => lines.push(format!("{:<9} {text}", format!("{label}:"))),
                None => lines.push(format!("{:<9} unknown", format!("{label}:"))),
            }
        }
        lines.push(format!(
            "Position: {} / {}",
            or_unknown(self.position.as_ref()),
            or_unknown(self.duration.as_ref())
        ));
        lines.push(match self.volume {
            Some(level) => format!("Volume:   {level:.2}"),
            None => "Volume:   unknown".to_string(),
        });
        lines.join("\n")
    }
}

#[tokio::main]
async fn main() -> StdResult<()> {
    let cli = Cli::parse();
    let connection = Connection::session().await?;
    let proxy = MyPlayerProxy::new(&connection).await?;
    if proxy.test_connection().await.is_err() {
        eprintln!("gsplayerd is not running");
        return Ok(());
    }
    handle_command(cli, &proxy).await
}

async fn handle_command(cli: Cli, proxy: &MyPlayerProxy<'_>) -> StdResult<()> {
    match cli.command {
        Commands::Queue(queue_cmd) => {
            for uri in queue_cmd.uris {
                report_state(&format!("Queued {uri}"), proxy.queue(&uri).await);
            }
        }
        Commands::Play => report_state("Play", proxy.play().await),
        Commands::Pause => report_state("Pause", proxy.pause().await),
        Commands::Stop => report_state("Stop", proxy.stop().await),
        Commands::Next => report_state("Next", proxy.next().await),
        Commands::Mute => {
            proxy.mute().await?;
            println!("Muted");
        }
        Commands::Volume(volume_cmd) => handle_volume_command(volume_cmd, proxy).await?,
        Commands::Seek(seek_cmd) => {
            proxy.set_position(seek_cmd.seconds).await?;
            println!("Seeking to {}s", seek_cmd.seconds);
        }
        Commands::Status(status_cmd) => {
            let status = fetch_status(proxy).await;
            if status_cmd.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", status.render());
            }
        }
        Commands::Quit => {
            proxy.quit().await?;
            println!("gsplayerd stopped");
        }
    }
    Ok(())
}

async fn handle_volume_command(
    volume_cmd: VolumeCommand,
    proxy: &MyPlayerProxy<'_>,
) -> StdResult<()> {
    match volume_cmd.level {
        Some(level) if !(0.0..=1.0).contains(&level) => Err(App::InvalidInput(format!(
            "volume must be between 0.0 and 1.0, got {level}"
        ))),
        Some(level) => {
            proxy.set_volume(level).await?;
            println!("Volume set to {level:.2}");
            Ok(())
        }
        None => {
            match proxy.volume().await {
                Ok(level) => println!("Volume: {level:.2}"),
                Err(e) => eprintln!("Volume unknown: {e}"),
            }
            Ok(())
        }
    }
}

/// Prints the state the daemon reports after an action, or why it reported none.
fn report_state(action: &str, result: zbus::Result<String>) {
    match result {
        Ok(state) => println!("{action}: {state}"),
        Err(e) => eprintln!("{action}: state unknown ({e})"),
    }
}

async fn fetch_status(proxy: &MyPlayerProxy<'_>) -> Status {
    Status {
        state: proxy.state().await.ok(),
        uri: proxy.uri().await.ok(),
        title: proxy.title().await.ok(),
        artist: proxy.artist().await.ok(),
        album: proxy.album().await.ok(),
        position: proxy.position().await.ok(),
        duration: proxy.duration().await.ok(),
        volume: proxy.volume().await.ok(),
    }
}
