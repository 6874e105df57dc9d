//! Headless host for the composite-root sample scene.
//!
//! Runs one or more arena scenes back to back without a window:
//!
//! 1. Load [`SceneConfig`] from an INI file (defaults when missing) and apply
//!    command-line overrides
//! 2. Create the process [`SceneContext`] and register the scene factories
//! 3. For every scene: build the roots, start the orchestrator on a
//!    [`LocalPool`] (the settings loader runs on the same pool), drive the
//!    frame loop, then tear the scene down
//!
//! Global services survive from one scene to the next; everything bound in
//! the local tier is dropped at teardown.
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --scenes 2 --frames 300
//! RUST_LOG=debug cargo run -- --dependency-report
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use futures::executor::LocalPool;
use log::{error, info, warn};

use compositeroot::game::{self, ArenaObjects, SessionStats, SettingsLoader};
use compositeroot::resources::scenecontext::SceneContext;
use compositeroot::resources::sceneconfig::SceneConfig;
use compositeroot::systems::frameloop::FrameLoop;
use compositeroot::systems::orchestrator::RootOrchestrator;

/// Composite-root scene host
#[derive(Parser)]
#[command(version, about = "Runs composite-root scenes headless")]
struct Cli {
    /// INI configuration file.
    #[arg(long, value_name = "PATH", default_value = "./config.ini")]
    config: PathBuf,

    /// Frames to run per scene (overrides the config file).
    #[arg(long, value_name = "N")]
    frames: Option<u32>,

    /// Scenes to run back to back (overrides the config file).
    #[arg(long, value_name = "N")]
    scenes: Option<u32>,

    /// Write the dependency report of the sample roots as JSON and exit.
    /// Optionally provide a path (default: standard output).
    #[arg(long, value_name = "PATH")]
    dependency_report: Option<Option<PathBuf>>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = SceneConfig::with_path(&cli.config);
    if let Err(e) = config.load_from_file() {
        warn!("{e}; using defaults");
    }
    if let Some(frames) = cli.frames {
        config.frames = frames;
    }
    if let Some(scenes) = cli.scenes {
        config.scenes = scenes;
    }

    let context = SceneContext::new();
    game::register_factories(&context);

    // Early-exit: print or write the dependency report
    if let Some(maybe_path) = cli.dependency_report {
        let mut orchestrator =
            RootOrchestrator::new(context.clone()).with_roots(game::arena_roots(&context, None));
        let json = match orchestrator.dependency_report().to_json() {
            Ok(json) => json,
            Err(e) => {
                eprintln!("Error building dependency report: {e}");
                std::process::exit(1);
            }
        };
        match maybe_path {
            Some(path) => {
                if let Err(e) = std::fs::write(&path, json) {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
                println!("Dependency report written to {}", path.display());
            }
            None => println!("{json}"),
        }
        return;
    }

    if let Err(e) = run(&config, context) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(config: &SceneConfig, mut context: SceneContext) -> Result<(), Box<dyn Error>> {
    let mut pool = LocalPool::new();
    let mut loader = SettingsLoader::with_seed(config.loader_seed);

    for scene in 0..config.scenes {
        let pending = if scene == 0 {
            Some(loader.request(&pool.spawner())?)
        } else {
            context = context.for_next_scene();
            None
        };

        let objects = ArenaObjects::new();
        let mut orchestrator = RootOrchestrator::new(context.clone())
            .with_roots(game::arena_roots(&context, pending))
            .with_scene_objects(objects.scene_objects());

        info!("Starting scene {}/{}", scene + 1, config.scenes);
        if let Err(e) = pool.run_until(orchestrator.start()) {
            orchestrator.teardown();
            return Err(e.into());
        }

        let mut frame_loop = FrameLoop::from_config(config);
        let stats = frame_loop.run(&mut orchestrator, config.frames);
        info!(
            "{} | {} frame(s), {} fixed step(s), {} audio cue(s)",
            objects.label.text(),
            stats.frames,
            stats.fixed_steps,
            objects.cue.plays()
        );
        orchestrator.teardown();
    }

    if let Ok(stats) = context.get_global::<SessionStats>() {
        info!(
            "Session over: {} scene(s), best score {}",
            stats.scenes_played.get(),
            stats.best_score.get()
        );
    }
    Ok(())
}
