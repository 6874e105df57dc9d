//! Host configuration.
//!
//! Settings for the headless host loaded from an INI file. Every key has a
//! safe default, and keys missing from the file keep their current value.
//!
//! # Configuration File Format
//!
//! ```ini
//! [loop]
//! frame_rate = 60
//! fixed_rate = 50
//! frames = 180
//! time_scale = 1.0
//!
//! [scene]
//! scenes = 2
//! loader_seed = 7
//! ```

use configparser::ini::Ini;
use log::info;
use std::path::PathBuf;

use crate::error::ConfigError;

const DEFAULT_FRAME_RATE: u32 = 60;
const DEFAULT_FIXED_RATE: u32 = 50;
const DEFAULT_FRAMES: u32 = 180;
const DEFAULT_TIME_SCALE: f32 = 1.0;
const DEFAULT_SCENES: u32 = 1;
const DEFAULT_LOADER_SEED: u64 = 7;
const DEFAULT_CONFIG_PATH: &str = "./config.ini";

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Simulated frames per second.
    pub frame_rate: u32,
    /// Fixed-step signals per second.
    pub fixed_rate: u32,
    /// Frames to run per scene.
    pub frames: u32,
    pub time_scale: f32,
    /// Scenes to run back to back.
    pub scenes: u32,
    /// Seed for the simulated settings loader latency.
    pub loader_seed: u64,
    pub config_path: PathBuf,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneConfig {
    /// Default values, read from `./config.ini` once loaded.
    pub fn new() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            fixed_rate: DEFAULT_FIXED_RATE,
            frames: DEFAULT_FRAMES,
            time_scale: DEFAULT_TIME_SCALE,
            scenes: DEFAULT_SCENES,
            loader_seed: DEFAULT_LOADER_SEED,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Default values, read from `path` once loaded.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load values from `config_path`. Missing keys keep their value.
    pub fn load_from_file(&mut self) -> Result<(), ConfigError> {
        let mut config = Ini::new();
        config.load(&self.config_path).map_err(ConfigError::Load)?;

        // [loop] section
        if let Some(rate) = config.getuint("loop", "frame_rate").ok().flatten() {
            self.frame_rate = rate as u32;
        }
        if let Some(rate) = config.getuint("loop", "fixed_rate").ok().flatten() {
            self.fixed_rate = rate as u32;
        }
        if let Some(frames) = config.getuint("loop", "frames").ok().flatten() {
            self.frames = frames as u32;
        }
        if let Some(scale) = config.getfloat("loop", "time_scale").ok().flatten() {
            self.time_scale = scale as f32;
        }

        // [scene] section
        if let Some(scenes) = config.getuint("scene", "scenes").ok().flatten() {
            self.scenes = scenes as u32;
        }
        if let Some(seed) = config.getuint("scene", "loader_seed").ok().flatten() {
            self.loader_seed = seed;
        }

        info!(
            "Loaded config: {} fps, {} fixed/s, {} frames x {} scene(s), time_scale={}",
            self.frame_rate, self.fixed_rate, self.frames, self.scenes, self.time_scale
        );
        Ok(())
    }

    /// Write every value to `config_path`, creating the file if needed.
    pub fn save_to_file(&self) -> Result<(), ConfigError> {
        let mut config = Ini::new();

        config.set("loop", "frame_rate", Some(self.frame_rate.to_string()));
        config.set("loop", "fixed_rate", Some(self.fixed_rate.to_string()));
        config.set("loop", "frames", Some(self.frames.to_string()));
        config.set("loop", "time_scale", Some(self.time_scale.to_string()));

        config.set("scene", "scenes", Some(self.scenes.to_string()));
        config.set("scene", "loader_seed", Some(self.loader_seed.to_string()));

        config.write(&self.config_path)?;
        info!("Saved config to {:?}", self.config_path);
        Ok(())
    }

    /// Unscaled seconds per frame.
    pub fn frame_delta(&self) -> f32 {
        1.0 / self.frame_rate.max(1) as f32
    }

    /// Seconds per fixed step.
    pub fn fixed_step(&self) -> f32 {
        1.0 / self.fixed_rate.max(1) as f32
    }
}
