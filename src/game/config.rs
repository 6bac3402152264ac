use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::input::{default_bindings, Bindings, GameAction};
use super::player::Movement;
use crate::error::ConfigError;
use crate::render::portal::MAX_DRAW_DEPTH;
use crate::world::sector::SectorId;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    pub key_bindings: Bindings,
    pub graphics: GraphicsConfig,
    pub gameplay: GameplayConfig,
    #[serde(default)]
    pub assets: AssetConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphicsConfig {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    /// Longest wait for window events before a frame is drawn anyway.
    pub frame_wait_ms: u64,
    /// Portal hops drawn from the player's sector.
    pub draw_depth: i32,
    pub lighting: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameplayConfig {
    pub player_speed: f64,
    pub player_turn_speed: f64,
    pub start_sector: SectorId,
    pub start_facing: f64,
    pub player_height: f64,
}

impl GameplayConfig {
    pub fn movement(&self) -> Movement {
        Movement {
            player_speed: self.player_speed,
            player_turn_speed: self.player_turn_speed,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelAsset {
    pub path: PathBuf,
    /// World setup fails if a required model cannot be loaded.
    #[serde(default)]
    pub required: bool,
    #[serde(default = "white")]
    pub color: [f32; 4],
    /// Drop an instance at this sector's centroid.
    #[serde(default)]
    pub sector: Option<SectorId>,
    #[serde(default = "unit_scale")]
    pub scale: f32,
}

fn white() -> [f32; 4] {
    [1.0; 4]
}

fn unit_scale() -> f32 {
    1.0
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssetConfig {
    pub textures: Vec<PathBuf>,
    pub models: Vec<ModelAsset>,
    #[serde(default)]
    pub map: Option<PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            textures: (461223101..=461223105)
                .map(|n| PathBuf::from(format!("assets/{n}.jpg")))
                .collect(),
            models: vec![ModelAsset {
                path: PathBuf::from("assets/teapot.obj"),
                required: false,
                color: [1.0, 1.0, 0.0, 1.0],
                sector: Some(0),
                scale: 0.25,
            }],
            map: None,
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            key_bindings: default_bindings(),
            graphics: GraphicsConfig {
                width: 960,
                height: 540,
                vsync: false,
                frame_wait_ms: 15,
                draw_depth: 10,
                lighting: true,
            },
            gameplay: GameplayConfig {
                player_speed: 10.0,
                player_turn_speed: 0.25,
                start_sector: 1,
                start_facing: 180.0,
                player_height: 1.0,
            },
            assets: AssetConfig::default(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "hero")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
}

impl GameConfig {
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Read settings from `path`. A missing file is created with defaults;
    /// an unreadable one is ignored.
    pub fn load_from(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    log::warn!("Failed to parse config: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => {
                let config = Self::default();
                config.save_to(path);
                config
            }
        };
        config.fill_missing_bindings();
        config.sanitize();
        config
    }

    /// Replace values that would break the frame loop with safe ones.
    fn sanitize(&mut self) {
        let graphics = &mut self.graphics;
        if graphics.draw_depth > MAX_DRAW_DEPTH {
            log::warn!(
                "draw_depth {} is above {MAX_DRAW_DEPTH}, clamping",
                graphics.draw_depth
            );
            graphics.draw_depth = MAX_DRAW_DEPTH;
        }

        // movement divides by both speeds
        let fallback = Movement::default();
        let gameplay = &mut self.gameplay;
        if !(gameplay.player_speed.is_finite() && gameplay.player_speed > 0.0) {
            log::warn!(
                "player_speed {} must be positive, using {}",
                gameplay.player_speed,
                fallback.player_speed
            );
            gameplay.player_speed = fallback.player_speed;
        }
        if !(gameplay.player_turn_speed.is_finite() && gameplay.player_turn_speed > 0.0) {
            log::warn!(
                "player_turn_speed {} must be positive, using {}",
                gameplay.player_turn_speed,
                fallback.player_turn_speed
            );
            gameplay.player_turn_speed = fallback.player_turn_speed;
        }
    }

    /// Actions added since the settings file was written get their default keys.
    fn fill_missing_bindings(&mut self) {
        let defaults = default_bindings();
        for action in GameAction::all() {
            if self.key_bindings.get(action).is_some_and(|keys| !keys.is_empty()) {
                continue;
            }
            log::warn!("{} has no keys bound, using defaults", action.display_name());
            if let Some(keys) = defaults.get(action) {
                self.key_bindings.insert(*action, keys.clone());
            }
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::warn!("Failed to create config directory: {e}");
                return;
            }
        }

        match toml::to_string_pretty(self) {
            Ok(contents) => {
                if let Err(e) = std::fs::write(path, contents) {
                    log::warn!("Failed to write config: {e}");
                }
            }
            Err(e) => {
                log::warn!("Failed to serialize config: {e}");
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
}

pub fn parse_geometry(s: &str) -> Result<Geometry, ConfigError> {
    let bad = || ConfigError::Geometry(s.to_string());
    let (w, h) = s.split_once(|c: char| c == 'x' || c == 'X').ok_or_else(bad)?;
    let width: u32 = w.trim().parse().map_err(|_| bad())?;
    let height: u32 = h.trim().parse().map_err(|_| bad())?;
    if width == 0 || height == 0 {
        return Err(bad());
    }
    Ok(Geometry { width, height })
}

#[derive(Parser, Debug)]
#[command(name = "hero", about = "Portal sector renderer", version)]
pub struct Args {
    /// Window size as WIDTHxHEIGHT
    #[arg(long, alias = "geom", value_name = "WxH", value_parser = parse_geometry)]
    pub geometry: Option<Geometry>,

    /// Trace-level logging
    #[arg(long)]
    pub verbose: bool,

    /// Debug-level logging
    #[arg(long)]
    pub debug: bool,

    /// Wait for vertical sync
    #[arg(long, conflicts_with = "no_vsync")]
    pub vsync: bool,

    /// Present as fast as possible
    #[arg(long)]
    pub no_vsync: bool,

    /// TOML sector map to load instead of the built-in rooms
    #[arg(long, value_name = "PATH")]
    pub map: Option<PathBuf>,

    /// Portal hops to draw
    #[arg(
        long,
        value_name = "N",
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i32).range(-1..=MAX_DRAW_DEPTH as i64)
    )]
    pub depth: Option<i32>,

    /// Run this many frames without a window and exit
    #[arg(long, value_name = "FRAMES")]
    pub headless: Option<u32>,
}

impl Args {
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Trace
        } else if self.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        }
    }

    /// Command line values win over the settings file.
    pub fn apply(&self, config: &mut GameConfig) {
        if let Some(g) = self.geometry {
            config.graphics.width = g.width;
            config.graphics.height = g.height;
        }
        if self.vsync {
            config.graphics.vsync = true;
        }
        if self.no_vsync {
            config.graphics.vsync = false;
        }
        if let Some(map) = &self.map {
            config.assets.map = Some(map.clone());
        }
        if let Some(depth) = self.depth {
            config.graphics.draw_depth = depth;
        }
    }
}
