//! Configuration Module
//! Server address and input locations, read from the environment.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host the HTTP server binds to
    pub host: String,
    /// Port the HTTP server binds to
    pub port: u16,
    /// Province boundaries (GeoJSON)
    pub boundaries_path: PathBuf,
    /// Per-province NDVI statistics (CSV)
    pub statistics_path: PathBuf,
    /// Join key on the boundary side (feature property)
    pub boundary_key: String,
    /// Join key on the statistics side (CSV column)
    pub statistics_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8050,
            boundaries_path: PathBuf::from("Provincias.geojson"),
            statistics_path: PathBuf::from("NDVI_Estadisticas_Provincias.csv"),
            boundary_key: "provincia".to_string(),
            statistics_key: "Provincia".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match lookup("NDVI_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "NDVI_PORT",
                value: raw,
            })?,
            None => defaults.port,
        };

        Ok(Self {
            host: lookup("NDVI_HOST").unwrap_or(defaults.host),
            port,
            boundaries_path: lookup("NDVI_BOUNDARIES")
                .map(PathBuf::from)
                .unwrap_or(defaults.boundaries_path),
            statistics_path: lookup("NDVI_STATISTICS")
                .map(PathBuf::from)
                .unwrap_or(defaults.statistics_path),
            boundary_key: lookup("NDVI_BOUNDARY_KEY").unwrap_or(defaults.boundary_key),
            statistics_key: lookup("NDVI_STATISTICS_KEY").unwrap_or(defaults.statistics_key),
        })
    }

    /// Address string for the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
