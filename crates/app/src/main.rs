mod backend;
mod sink;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use audio_shapes_core::{
    voice::FADE_SECONDS, ConfigSnapshot, Engine, Result, ShapeAudioError, ShapeKind, Waveform,
};
use backend::CpalBackend;
use sink::TraceSink;

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Live(args) => run_live(args),
        Commands::Shapes => {
            print_shapes();
            Ok(())
        }
    }
}

fn run_live(args: LiveArgs) -> Result<()> {
    let config = build_config(&args)?;
    tracing::info!(
        shape = config.shape.key(),
        duration = args.duration,
        "starting live mode"
    );

    let mut engine = Engine::with_config(CpalBackend::new(), config);

    if let Some(path) = &args.sample {
        let bytes = std::fs::read(path)?;
        match engine.load_sample(&bytes) {
            Ok(()) => tracing::info!(?path, "sample loaded"),
            Err(err) => tracing::warn!(?path, %err, "could not decode sample; using synth"),
        }
    }

    engine.play()?;

    let mut sink = TraceSink::new(60);
    let frame = Duration::from_millis(16);
    let started = Instant::now();
    let mut last = started;
    while started.elapsed().as_secs_f32() < args.duration {
        let now = Instant::now();
        let dt = (now - last).as_secs_f32();
        last = now;
        engine.tick(dt, &mut sink);
        thread::sleep(frame);
    }

    engine.stop();
    // Let the fade-out finish before the stream is torn down.
    thread::sleep(Duration::from_secs_f32(FADE_SECONDS * 2.0));
    engine.tick(FADE_SECONDS * 2.0, &mut sink);
    engine.shutdown();
    Ok(())
}

fn build_config(args: &LiveArgs) -> Result<ConfigSnapshot> {
    let mut config = match &args.preset {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            serde_json::from_str(&text)
                .map_err(|e| ShapeAudioError::msg(format!("invalid preset: {e}")))?
        }
        None => ConfigSnapshot::default(),
    };

    if let Some(shape) = &args.shape {
        config.shape = ShapeKind::from_key(shape)?;
    }
    if let Some(wave) = &args.wave {
        config.waveform = Waveform::from_key(wave)?;
    }
    if let Some(freq) = args.freq {
        config.base_frequency = freq;
    }
    if let Some(radius) = args.radius {
        config.radius = radius;
    }
    if let Some(speed) = args.orbit_speed {
        config.orbit_speed = speed;
    }
    if let Some(volume) = args.volume {
        config.master_volume = volume.clamp(0.0, 1.0);
    }
    if args.no_elevation {
        config.auto_elevation = false;
    }
    Ok(config)
}

fn print_shapes() {
    for kind in ShapeKind::ALL {
        let def = kind.definition();
        let ratios: Vec<String> = def.intervals.iter().map(|r| format!("{r:.3}")).collect();
        println!(
            "{:<10} {} vertices  intervals [{}]",
            kind.key(),
            def.vertex_count(),
            ratios.join(", ")
        );
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Spatialized audio for orbiting geometric shapes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a shape's voices in real time.
    Live(LiveArgs),
    /// List the shape catalog.
    Shapes,
}

#[derive(clap::Args, Debug)]
struct LiveArgs {
    /// Shape key (circle, triangle, square, pyramid).
    #[arg(short, long)]
    shape: Option<String>,
    /// Oscillator waveform (sine, sawtooth, square, triangle).
    #[arg(short, long)]
    wave: Option<String>,
    /// Base frequency in Hz.
    #[arg(short, long)]
    freq: Option<f32>,
    /// Orbit radius in metres.
    #[arg(short, long)]
    radius: Option<f32>,
    /// Orbit speed in radians per second.
    #[arg(short, long)]
    orbit_speed: Option<f32>,
    /// Master volume, 0 to 1.
    #[arg(short, long)]
    volume: Option<f32>,
    /// Disable the automatic elevation bobbing.
    #[arg(long)]
    no_elevation: bool,
    /// WAV file to loop instead of the synth voices.
    #[arg(long)]
    sample: Option<PathBuf>,
    /// JSON preset file with configuration values.
    #[arg(short, long)]
    preset: Option<PathBuf>,
    /// How long to play, in seconds.
    #[arg(short, long, default_value_t = 10.0)]
    duration: f32,
}
