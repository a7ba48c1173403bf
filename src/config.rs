use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::map::LatLng;

#[derive(Parser, Debug)]
#[command(name = "mapboard", about = "Map-centric community posting front end")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Base URL of the REST backend
    #[arg(long)]
    pub backend_url: Option<String>,

    /// JSON file with posts to show when the backend is unreachable
    #[arg(long)]
    pub fixtures: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub map: MapConfig,
    pub geolocation: GeolocationConfig,
    pub auth: AuthConfig,
    pub fixtures: FixturesConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub zoom: f64,
    pub tile_url: String,
    /// Where a post's marker sits on screen while its detail panel is open.
    pub detail_fraction_x: f64,
    pub detail_fraction_y: f64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GeolocationConfig {
    pub fallback_lat: f64,
    pub fallback_lng: f64,
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub secure_cookies: bool,
    pub cookie_max_age_hours: u64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct FixturesConfig {
    pub posts_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom: 13.0,
            tile_url: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            detail_fraction_x: 0.75,
            detail_fraction_y: 0.5,
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            fallback_lat: LatLng::TOKYO_STATION.lat,
            fallback_lng: LatLng::TOKYO_STATION.lng,
            timeout_ms: 10_000,
            maximum_age_ms: 300_000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secure_cookies: false,
            cookie_max_age_hours: 720,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let config_path = match cli.config.clone() {
            Some(path) => Some(path),
            None => Self::default_path(),
        };

        let mut config = match config_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                toml::from_str(&content)?
            }
            _ => Config::default(),
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref url) = cli.backend_url {
            config.backend.base_url = url.clone();
        }
        if let Some(ref path) = cli.fixtures {
            config.fixtures.posts_path = Some(path.clone());
        }

        config.validate()?;
        Ok(config)
    }

    /// `~/.mapboard/config.toml`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".mapboard").join("config.toml"))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if LatLng::new(self.geolocation.fallback_lat, self.geolocation.fallback_lng).is_none() {
            anyhow::bail!(
                "geolocation fallback ({}, {}) is not a valid coordinate",
                self.geolocation.fallback_lat,
                self.geolocation.fallback_lng
            );
        }
        for (name, v) in [
            ("map.detail_fraction_x", self.map.detail_fraction_x),
            ("map.detail_fraction_y", self.map.detail_fraction_y),
        ] {
            if !(0.0..=1.0).contains(&v) {
                anyhow::bail!("{name} must be within [0, 1], got {v}");
            }
        }
        Ok(())
    }

    pub fn fallback_point(&self) -> LatLng {
        LatLng::new(self.geolocation.fallback_lat, self.geolocation.fallback_lng)
            .unwrap_or(LatLng::TOKYO_STATION)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }
}
