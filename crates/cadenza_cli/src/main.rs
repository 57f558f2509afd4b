//! Cadenza CLI
//!
//! Run animation scenes against a simulated clock and inspect presets.

use anyhow::Result;
use cadenza_animation::{ManualClock, PlayState, PresetRegistry};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod scene;

use scene::{Scene, SceneConfig};

#[derive(Parser)]
#[command(name = "cadenza")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cadenza animation sequencer CLI", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scene to completion and print sampled target properties
    Run {
        /// Scene file
        scene: PathBuf,

        /// Simulated frame length in milliseconds
        #[arg(long, default_value = "16.667")]
        frame_ms: f64,

        /// Stop after this many frames
        #[arg(long, default_value = "10000")]
        max_frames: usize,

        /// Print a sample every N frames
        #[arg(long, default_value = "10")]
        sample_every: usize,

        /// Play the timeline backwards
        #[arg(long)]
        reverse: bool,
    },

    /// Validate a scene and print its segment table
    Check {
        /// Scene file
        scene: PathBuf,
    },

    /// List the available presets
    Presets {
        /// Additional preset file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scene,
            frame_ms,
            max_frames,
            sample_every,
            reverse,
        } => cmd_run(&scene, frame_ms, max_frames, sample_every, reverse),

        Commands::Check { scene } => cmd_check(&scene),

        Commands::Presets { file } => cmd_presets(file.as_deref()),
    }
}

fn cmd_run(
    path: &Path,
    frame_ms: f64,
    max_frames: usize,
    sample_every: usize,
    reverse: bool,
) -> Result<()> {
    if !(frame_ms.is_finite() && frame_ms > 0.0) {
        anyhow::bail!("Invalid frame length {}ms", frame_ms);
    }

    let config = SceneConfig::load(path)?;
    let clock = Rc::new(ManualClock::new());
    let scene = config.build(clock.clone())?;
    let timeline = &scene.timeline;

    info!(
        "Running {} ({}ms, {} segments)",
        path.display(),
        timeline.duration(),
        timeline.segment_count()
    );

    if reverse {
        timeline.reverse();
    }
    timeline.play();

    let sample_every = sample_every.max(1);
    let mut frames = 0;
    while frames < max_frames && timeline.play_state().is_active() {
        clock.advance(frame_ms);
        frames += 1;
        if frames % sample_every == 0 {
            print_sample(frames, &scene);
        }
    }
    print_sample(frames, &scene);

    if timeline.play_state() == PlayState::Finished {
        info!("Finished after {} frames ({:.1}ms)", frames, clock.elapsed());
    } else {
        warn!(
            "Stopped after {} frames with the timeline {}",
            frames,
            timeline.play_state()
        );
    }

    Ok(())
}

fn print_sample(frame: usize, scene: &Scene) {
    let time = scene
        .timeline
        .current_time()
        .map_or_else(|| "-".to_string(), |t| format!("{t:.1}"));
    let targets: Vec<String> = scene
        .registry
        .targets()
        .iter()
        .map(|target| {
            let properties: Vec<String> = target
                .properties()
                .iter()
                .map(|(name, value)| format!("{name}={value:.3}"))
                .collect();
            format!("{}[{}]", target.id(), properties.join(" "))
        })
        .collect();

    println!(
        "{frame:>6} {time:>9} {:<8} {}",
        scene.timeline.play_state(),
        targets.join(" ")
    );
}

fn cmd_check(path: &Path) -> Result<()> {
    let config = SceneConfig::load(path)?;
    let scene = config.build(Rc::new(ManualClock::new()))?;

    info!(
        "{} is valid: {} targets, {} segments",
        path.display(),
        scene.registry.len(),
        scene.timeline.segment_count()
    );

    for (index, (start, end)) in scene.timeline.segment_offsets().iter().enumerate() {
        println!("{:>3} {:>9.1} {:>9.1}", index + 1, start, end);
    }
    println!("duration {:.1}ms", scene.timeline.duration());

    Ok(())
}

fn cmd_presets(file: Option<&Path>) -> Result<()> {
    let mut presets = PresetRegistry::with_builtins();
    if let Some(file) = file {
        let count = presets.load_file(file)?;
        info!("Loaded {} presets from {}", count, file.display());
    }

    for name in presets.names() {
        let Some(preset) = presets.get(name) else {
            continue;
        };
        let duration = preset
            .duration
            .map_or_else(|| "-".to_string(), |d| format!("{d}ms"));
        println!(
            "{:<16} {:>8} {:<14} {} keyframes",
            name,
            duration,
            preset.easing.as_deref().unwrap_or("linear"),
            preset.keyframes.len()
        );
    }

    Ok(())
}
