use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub(crate) const MAX_PARTICLES: u32 = 200;

#[derive(Parser, Debug, Clone)]
#[command(name = "particle-universe")]
#[command(about = "Interactive particle universe for the terminal", long_about = None)]
pub(crate) struct Args {
    /// Particles per generation (0..=200)
    #[arg(long)]
    pub(crate) count: Option<u32>,

    /// FPS cap (render rate)
    #[arg(long)]
    pub(crate) fps: Option<u32>,

    /// RNG seed; random when omitted
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Float animation speed
    #[arg(long, value_enum)]
    pub(crate) speed: Option<AnimationSpeed>,

    /// Settings file (JSON). Defaults to the platform config dir.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Write tracing output here (filtered by RUST_LOG)
    #[arg(long)]
    pub(crate) log_file: Option<PathBuf>,

    /// Render particles in white only
    #[arg(long, default_value_t = false)]
    pub(crate) no_color: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AnimationSpeed {
    Slow,
    Normal,
    Fast,
}

impl AnimationSpeed {
    pub(crate) fn factor(self) -> f32 {
        match self {
            AnimationSpeed::Slow => 0.5,
            AnimationSpeed::Normal => 1.0,
            AnimationSpeed::Fast => 2.0,
        }
    }

    pub(crate) fn next(self) -> Self {
        match self {
            AnimationSpeed::Slow => AnimationSpeed::Normal,
            AnimationSpeed::Normal => AnimationSpeed::Fast,
            AnimationSpeed::Fast => AnimationSpeed::Slow,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            AnimationSpeed::Slow => "slow",
            AnimationSpeed::Normal => "normal",
            AnimationSpeed::Fast => "fast",
        }
    }
}

/// Fixed delays that pace every effect, in milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Timings {
    pub(crate) loading_ms: u64,
    pub(crate) spawn_stagger_ms: u64,
    pub(crate) explode_step_ms: u64,
    pub(crate) explode_linger_ms: u64,
    pub(crate) shake_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            loading_ms: 1000,
            spawn_stagger_ms: 50,
            explode_step_ms: 100,
            explode_linger_ms: 1000,
            shake_ms: 500,
        }
    }
}

impl Timings {
    pub(crate) fn loading(&self) -> Duration {
        Duration::from_millis(self.loading_ms)
    }
    pub(crate) fn spawn_stagger(&self) -> Duration {
        Duration::from_millis(self.spawn_stagger_ms)
    }
    pub(crate) fn explode_step(&self) -> Duration {
        Duration::from_millis(self.explode_step_ms)
    }
    pub(crate) fn explode_linger(&self) -> Duration {
        Duration::from_millis(self.explode_linger_ms)
    }
    pub(crate) fn shake(&self) -> Duration {
        Duration::from_millis(self.shake_ms)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) particle_count: u32,
    pub(crate) fps_cap: u32,
    pub(crate) enable_color: bool,
    pub(crate) animation_speed: AnimationSpeed,
    pub(crate) seed: Option<u64>,
    pub(crate) timings: Timings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            particle_count: 20,
            fps_cap: 30,
            enable_color: true,
            animation_speed: AnimationSpeed::Normal,
            seed: None,
            timings: Timings::default(),
        }
    }
}

impl Settings {
    /// File settings first, then CLI flags on top.
    pub(crate) fn resolve(args: &Args) -> Result<Self> {
        let path = match &args.config {
            Some(p) => Some(p.clone()),
            None => default_settings_path()?,
        };
        let base = path.as_deref().map(load_settings).unwrap_or_default();
        Ok(base.with_overrides(args))
    }

    pub(crate) fn with_overrides(mut self, args: &Args) -> Self {
        if let Some(c) = args.count {
            self.particle_count = c;
        }
        if let Some(f) = args.fps {
            self.fps_cap = f;
        }
        if let Some(s) = args.seed {
            self.seed = Some(s);
        }
        if let Some(sp) = args.speed {
            self.animation_speed = sp;
        }
        if args.no_color {
            self.enable_color = false;
        }
        self.particle_count = self.particle_count.min(MAX_PARTICLES);
        self.fps_cap = self.fps_cap.clamp(10, 240);
        self
    }
}

pub(crate) fn default_settings_path() -> Result<Option<PathBuf>> {
    let Some(proj) = ProjectDirs::from("com", "particle-universe", "ParticleUniverse") else {
        return Ok(None);
    };
    let dir = proj.config_dir();
    if !dir.exists() {
        return Ok(None);
    }
    let path = dir.join("settings.json");
    let found = path
        .try_exists()
        .with_context(|| format!("could not inspect {}", path.display()))?;
    Ok(found.then_some(path))
}

/// Missing or malformed files fall back to defaults.
pub(crate) fn load_settings(path: &Path) -> Settings {
    if let Ok(s) = fs::read_to_string(path) {
        match serde_json::from_str::<Settings>(&s) {
            Ok(v) => return v,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "ignoring malformed settings");
            }
        }
    }
    Settings::default()
}
