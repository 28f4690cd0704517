use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use terrastream_world::TerrainConfig;
use tracing::warn;

const DEFAULT_CONFIG_PATH: &str = "config/terrain.toml";

/// Settings for one headless flight.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FlightConfig {
    /// Viewpoint steps to simulate.
    pub ticks: u64,
    /// World units travelled per tick.
    pub speed: f32,
    /// Heading in degrees; 0 flies along +x, 90 along +z.
    pub heading_degrees: f32,
    /// Height kept above the ground under the viewpoint.
    pub camera_height: f32,
    /// Idle slices granted to the streamer after each step.
    pub idle_slices_per_tick: u32,
}

impl Default for FlightConfig {
    fn default() -> Self {
        Self {
            ticks: 240,
            speed: 16.0,
            heading_degrees: 0.0,
            camera_height: 40.0,
            idle_slices_per_tick: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seed phrase hashed into the terrain generator.
    pub seed: String,
    pub terrain: TerrainConfig,
    pub flight: FlightConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            seed: "terrastream".to_string(),
            terrain: TerrainConfig::default(),
            flight: FlightConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    AppConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                } else {
                    warn!(
                        "Terrain config not found at {}. Using defaults",
                        path.display()
                    );
                }
                AppConfig::default()
            }
        }
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        Ok(())
    }
}
