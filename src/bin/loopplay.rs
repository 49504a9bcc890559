use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use loopplay::{BundleDir, LocalResource, PlaybackController, PlayerConfig, RodioEngine};

#[derive(Parser, Debug)]
#[command(name = "loopplay", version)]
struct Cli {
    /// Start from one of the stock configurations.
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Player config JSON (overrides the preset).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Explicit URL, preferred over `--resource`.
    #[arg(long)]
    url: Option<String>,

    /// Bundled asset as `name.ext`.
    #[arg(long)]
    resource: Option<LocalResource>,

    /// Directory holding bundled assets.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Start muted.
    #[arg(long)]
    muted: bool,

    /// Play once instead of looping.
    #[arg(long)]
    no_loop: bool,

    /// Stop after this many restarts.
    #[arg(long)]
    loops: Option<u64>,

    /// Stop after this many seconds.
    #[arg(long)]
    seconds: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Preset {
    Remote,
    Local,
    Advanced,
    Beveled,
}

impl Preset {
    fn config(self) -> PlayerConfig {
        match self {
            Preset::Remote => PlayerConfig::remote_stream(),
            Preset::Local => PlayerConfig::local_clip(),
            Preset::Advanced => PlayerConfig::advanced(),
            Preset::Beveled => PlayerConfig::beveled(None),
        }
    }
}

fn build_config(cli: &Cli) -> loopplay::Result<PlayerConfig> {
    let mut config = match (&cli.config, cli.preset) {
        (Some(path), _) => PlayerConfig::from_path(path)?,
        (None, Some(preset)) => preset.config(),
        (None, None) => PlayerConfig::default(),
    };

    if cli.url.is_some() {
        config.url = cli.url.clone();
    }
    if cli.resource.is_some() {
        config.resource = cli.resource.clone();
    }
    if cli.muted {
        config.muted = true;
    }
    if cli.no_loop {
        config.looping = false;
    }
    Ok(config)
}

/// An empty source never ends or loops, so only `--seconds` can stop the run.
fn nothing_to_wait_for(source_empty: bool, seconds: Option<u64>) -> bool {
    source_empty && seconds.is_none()
}

fn main() -> loopplay::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    let assets = match &cli.assets {
        Some(dir) => BundleDir::new(dir),
        None => BundleDir::default_location(),
    };
    log::debug!("Looking up assets in {}", assets.root().display());

    let engine = RodioEngine::new()?;
    let mut player = PlaybackController::from_config(engine, &config, &assets);
    if player.source().is_empty() {
        log::warn!("No playable source, the player will stay silent");
    }
    if nothing_to_wait_for(player.source().is_empty(), cli.seconds) {
        println!("{}", serde_json::to_string_pretty(&player.status())?);
        return Ok(());
    }

    let deadline = cli.seconds.map(|s| Instant::now() + Duration::from_secs(s));
    {
        let mut session = player.visible();
        loop {
            session.wait_for_event(Duration::from_millis(250));

            if let Some(error) = session.engine().status().error {
                log::error!("Playback failed: {}", error);
                break;
            }
            if cli.loops.is_some_and(|n| session.loops_completed() >= n) {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            if !session.is_looping() && session.engine().status().items_completed > 0 {
                break;
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&player.status())?);
    Ok(())
}
