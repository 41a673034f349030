use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use calmease::assets::{find_sound, AMBIENT_SOUNDS, EMERGENCY_SOUNDS};
use calmease::audio::{ChannelKind, ChimePlayer, MediaBackend, SilentChime, SimulatedBackend};
use calmease::breathing::{BreathingPattern, BreathingPhase};
use calmease::catalog::{FsTrackCatalog, TrackKind};
use calmease::preferences::JsonFilePreferenceStore;
use calmease::session::TimerUpdate;
use calmease::{AppConfig, ContextDeps, ReliefContext};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;

/// Track length assumed by the simulated backend when nothing is decoded.
const SIMULATED_TRACK_SECONDS: f64 = 600.0;

#[derive(Parser, Debug)]
#[command(name = "calmease_cli", about = "Relaxation audio player and breathing guide")]
struct Cli {
    /// JSON config file (defaults to assets/calmease_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Use simulated playback instead of the audio device
    #[arg(long, global = true)]
    simulate: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the ambient sound catalog
    Sounds,
    /// Run a guided breathing pattern
    Breathe(BreatheArgs),
    /// Play the selected voice track with a countdown and fade-out
    Session(SessionArgs),
    /// Play the calming voice and background pair
    CalmNow {
        /// Seconds to keep playing before exiting
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    /// Toggle or list favorite ambient sounds
    Favorite {
        /// Sound id to toggle; omit to list favorites
        id: Option<String>,
    },
    /// Manage uploaded tracks
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

#[derive(Args, Debug)]
struct BreatheArgs {
    /// Preset id: 4-7-8, 4-4-6 or 3-3-3
    #[arg(long, conflicts_with = "inhale")]
    preset: Option<String>,
    #[arg(long, requires_all = ["hold", "exhale"])]
    inhale: Option<f64>,
    #[arg(long)]
    hold: Option<f64>,
    #[arg(long)]
    exhale: Option<f64>,
    #[arg(long)]
    cycles: Option<u32>,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Session length in minutes; overrides the stored preference
    #[arg(long)]
    minutes: Option<u32>,
    /// Voice track to select before starting
    #[arg(long)]
    track: Option<String>,
    /// Ambient sound id to play underneath
    #[arg(long)]
    ambient: Option<String>,
    #[arg(long)]
    speed: Option<f32>,
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Store an audio file
    Add {
        file: PathBuf,
        /// voice or background
        #[arg(long, default_value = "voice")]
        kind: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        mime: Option<String>,
    },
    List,
    Remove {
        id: u64,
    },
    /// Play a stored track on its channel
    Play {
        id: u64,
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("calmease error: {err:?}");
            return ExitCode::from(1);
        }
    };

    match runtime.block_on(cli.execute()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("calmease error: {err:?}");
            ExitCode::from(1)
        }
    }
}

impl Cli {
    async fn execute(self) -> Result<()> {
        let config = match &self.config {
            Some(path) => AppConfig::load_from_file(path),
            None => AppConfig::load(),
        };

        if let Command::Sounds = self.command {
            print_sounds();
            return Ok(());
        }

        let ctx = build_context(config, self.simulate)?;
        match self.command {
            Command::Sounds => Ok(()),
            Command::Breathe(args) => breathe_command(&ctx, args).await,
            Command::Session(args) => session_command(&ctx, args).await,
            Command::CalmNow { seconds } => calm_now_command(&ctx, seconds).await,
            Command::Favorite { id } => favorite_command(&ctx, id),
            Command::Catalog(command) => catalog_command(&ctx, command).await,
        }
    }
}

fn build_context(config: AppConfig, simulate: bool) -> Result<ReliefContext> {
    fs::create_dir_all(&config.storage.data_dir)
        .with_context(|| format!("creating data dir {:?}", config.storage.data_dir))?;

    let preferences = Arc::new(JsonFilePreferenceStore::open(
        config.storage.preferences_path(),
    ));
    let catalog = Arc::new(
        FsTrackCatalog::open(config.storage.catalog_dir()).context("opening track catalog")?,
    );
    let (voice_backend, background_backend, chime) = backends(&config, simulate)?;

    let ctx = ReliefContext::new(
        config,
        ContextDeps {
            voice_backend,
            background_backend,
            chime,
            preferences,
            catalog,
        },
    )?;
    Ok(ctx)
}

type Backends = (
    Arc<dyn MediaBackend>,
    Arc<dyn MediaBackend>,
    Arc<dyn ChimePlayer>,
);

fn simulated_backends() -> Backends {
    let backend = || {
        Arc::new(SimulatedBackend::new().with_fallback_duration(SIMULATED_TRACK_SECONDS))
            as Arc<dyn MediaBackend>
    };
    (backend(), backend(), Arc::new(SilentChime::new()))
}

#[cfg(not(target_os = "android"))]
fn backends(config: &AppConfig, simulate: bool) -> Result<Backends> {
    use calmease::assets::AssetResolver;
    use calmease::audio::{CpalBackend, CpalChime};

    if simulate {
        return Ok(simulated_backends());
    }

    let resolver = AssetResolver::new(&config.audio.assets_root);
    let voice = CpalBackend::open("voice", resolver.clone()).context("opening voice output")?;
    let background =
        CpalBackend::open("background", resolver).context("opening background output")?;
    let chime: Arc<dyn ChimePlayer> = match CpalChime::open() {
        Ok(chime) => Arc::new(chime),
        Err(err) => {
            tracing::warn!("chime unavailable, continuing silently: {}", err);
            Arc::new(SilentChime::new())
        }
    };
    Ok((Arc::new(voice), Arc::new(background), chime))
}

#[cfg(target_os = "android")]
fn backends(_config: &AppConfig, _simulate: bool) -> Result<Backends> {
    Ok(simulated_backends())
}

fn print_sounds() {
    println!("Ambient sounds:");
    for sound in AMBIENT_SOUNDS.iter() {
        println!("  {:<18} {:<22} {:?}", sound.id, sound.name, sound.category);
    }
    println!("Quick relief:");
    for sound in EMERGENCY_SOUNDS.iter() {
        println!("  {:<18} {}", sound.id, sound.name);
    }
}

async fn breathe_command(ctx: &ReliefContext, args: BreatheArgs) -> Result<()> {
    let cycles = args
        .cycles
        .unwrap_or(ctx.config().breathing.default_cycles);

    let pattern = match (args.preset.as_deref(), args.inhale) {
        (Some(id), _) => match BreathingPattern::preset(id, cycles) {
            Some(pattern) => pattern,
            None => bail!("unknown preset {id}"),
        },
        (None, Some(inhale)) => BreathingPattern::new(
            inhale,
            args.hold.unwrap_or_default(),
            args.exhale.unwrap_or_default(),
            cycles,
        ),
        (None, None) => BreathingPattern::preset("4-7-8", cycles)
            .context("default preset missing")?,
    };

    let mut updates = ctx.breathing_stream();
    ctx.breathing().start(pattern)?;

    while let Some(update) = updates.next().await {
        if update.phase == BreathingPhase::Complete {
            println!("{}", update.guidance);
            break;
        }
        println!(
            "[{}/{}] {:<7} {}",
            update.cycle_index,
            update.total_cycles,
            update.phase.as_str(),
            update.guidance
        );
    }
    Ok(())
}

async fn session_command(ctx: &ReliefContext, args: SessionArgs) -> Result<()> {
    if let Some(minutes) = args.minutes {
        ctx.set_session_minutes(minutes);
    }
    if let Some(track) = args.track.as_deref() {
        ctx.set_selected_track(track).await?;
    }
    if let Some(speed) = args.speed {
        ctx.set_speed(speed)?;
    }
    if let Some(id) = args.ambient.as_deref() {
        let sound = find_sound(id).with_context(|| format!("unknown ambient sound {id}"))?;
        ctx.coordinator().play_bg(Some(sound.src)).await?;
    }

    let mut timer = ctx.subscribe_timer();
    let progress = ctx.start_progress_reporter();
    ctx.start_relaxation().await?;

    if !ctx.timer().is_active() {
        println!("Timer disabled; press Ctrl+C to stop.");
        let _ = tokio::signal::ctrl_c().await;
        progress.abort();
        return Ok(());
    }

    loop {
        tokio::select! {
            update = timer.recv() => match update {
                Some(TimerUpdate::Tick { remaining_seconds }) => {
                    println!("{:02}:{:02}", remaining_seconds / 60, remaining_seconds % 60);
                }
                Some(TimerUpdate::FadeStarted { duration_ms, .. }) => {
                    println!("Fading out over {duration_ms} ms");
                }
                Some(TimerUpdate::Completed) | Some(TimerUpdate::Cancelled) | None => break,
                Some(_) => {}
            },
            _ = tokio::signal::ctrl_c() => {
                ctx.end_session_with_fade()?;
            }
        }
    }

    progress.abort();
    ctx.coordinator().stop_all();
    println!("Session complete.");
    Ok(())
}

async fn calm_now_command(ctx: &ReliefContext, seconds: u64) -> Result<()> {
    let outcome = ctx.calm_now().await;
    if let Err(err) = &outcome.voice {
        eprintln!("voice: {err}");
    }
    if let Err(err) = &outcome.background {
        eprintln!("background: {err}");
    }
    if outcome.voice.is_err() && outcome.background.is_err() {
        bail!("neither channel could play");
    }

    tokio::time::sleep(Duration::from_secs(seconds)).await;
    ctx.coordinator().stop_all();
    Ok(())
}

fn favorite_command(ctx: &ReliefContext, id: Option<String>) -> Result<()> {
    let favorites = ctx.favorites();
    match id {
        Some(id) => {
            if find_sound(&id).is_none() {
                bail!("unknown ambient sound {id}");
            }
            let now = favorites.toggle(&id);
            println!("{id}: {}", if now { "favorite" } else { "not favorite" });
        }
        None => {
            for id in favorites.ids() {
                println!("{id}");
            }
        }
    }
    Ok(())
}

async fn catalog_command(ctx: &ReliefContext, command: CatalogCommand) -> Result<()> {
    let catalog = ctx.catalog();
    match command {
        CatalogCommand::Add {
            file,
            kind,
            name,
            mime,
        } => {
            let kind = TrackKind::parse(&kind)
                .with_context(|| format!("kind must be voice or background, got {kind}"))?;
            let data = fs::read(&file).with_context(|| format!("reading {:?}", file))?;
            let name = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "untitled".to_string())
            });
            let id = catalog.add(&name, kind, &data, mime.as_deref())?;
            println!("{id}");
        }
        CatalogCommand::List => {
            for track in catalog.list()? {
                println!("{}", serde_json::to_string(&track)?);
            }
        }
        CatalogCommand::Remove { id } => catalog.remove(id)?,
        CatalogCommand::Play { id, seconds } => {
            let kind = ctx.play_catalog_track(id).await?;
            println!("playing {id} on {}", kind.as_str());
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            match kind {
                ChannelKind::Voice => ctx.coordinator().pause_voice(),
                ChannelKind::Background => ctx.coordinator().pause_bg(),
            }
        }
    }
    Ok(())
}
