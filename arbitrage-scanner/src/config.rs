//! Process configuration from the environment and an optional `.env` file

use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

use arbitrage_core::exchanges::UnknownSource;
use arbitrage_core::{ScannerConfig, Source, Symbol};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("PORT must be a number between 1 and 65535, got {0:?}")]
    InvalidPort(String),
    #[error("invalid symbol {0:?} in SYMBOLS")]
    InvalidSymbol(String),
    #[error("{0} in SOURCES")]
    UnknownSource(#[from] UnknownSource),
    #[error("{0} is set but lists nothing")]
    EmptyList(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub static_dir: PathBuf,
    pub symbols: Vec<Symbol>,
    pub sources: Vec<Source>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let scanner = ScannerConfig::default();
        Self {
            port: scanner.server.port,
            static_dir: scanner.server.static_dir,
            symbols: scanner.symbols,
            sources: scanner.sources,
        }
    }
}

impl AppConfig {
    /// Read `.env` if present, then the process environment
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => info!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("PORT") {
            config.port = match raw.trim().parse::<u16>() {
                Ok(port) if port > 0 => port,
                _ => return Err(ConfigError::InvalidPort(raw)),
            };
        }

        if let Some(dir) = lookup("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        if let Some(raw) = lookup("SYMBOLS") {
            config.symbols = split_list(&raw)
                .map(|item| {
                    let symbol = Symbol::new(item.to_ascii_uppercase());
                    if symbol.validate() {
                        Ok(symbol)
                    } else {
                        Err(ConfigError::InvalidSymbol(item.to_string()))
                    }
                })
                .collect::<Result<_, _>>()?;
            if config.symbols.is_empty() {
                return Err(ConfigError::EmptyList("SYMBOLS"));
            }
            dedup_list("SYMBOLS", &mut config.symbols);
        }

        if let Some(raw) = lookup("SOURCES") {
            config.sources = split_list(&raw)
                .map(str::parse::<Source>)
                .collect::<Result<_, _>>()?;
            if config.sources.is_empty() {
                return Err(ConfigError::EmptyList("SOURCES"));
            }
            dedup_list("SOURCES", &mut config.sources);
        }

        Ok(config)
    }

    pub fn scanner_config(&self) -> ScannerConfig {
        let mut scanner = ScannerConfig {
            symbols: self.symbols.clone(),
            sources: self.sources.clone(),
            ..Default::default()
        };
        scanner.server.port = self.port;
        scanner.server.static_dir = self.static_dir.clone();
        scanner
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

/// Keep the first occurrence of each entry, in listed order
fn dedup_list<T: PartialEq + std::fmt::Display>(name: &str, items: &mut Vec<T>) {
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        if kept.contains(&item) {
            warn!("Ignoring duplicate {} in {}", item, name);
        } else {
            kept.push(item);
        }
    }
    *items = kept;
}
