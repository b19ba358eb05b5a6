use crate::errors::Error;
use biblio_core::config::ClientConfig;
use biblio_core::{ErrorInfo, StoreRegistry};

pub struct AppState {
    pub registry: StoreRegistry,
    /// Print JSON instead of text
    pub json: bool,
}

impl AppState {
    pub const fn new(registry: StoreRegistry, json: bool) -> Self {
        Self { registry, json }
    }

    /// Reads the environment, applies the command line override and mounts the stores
    pub fn connect(api_url: Option<&str>, json: bool) -> Result<Self, Error> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = api_url {
            config = config.with_base_url(url)?;
        }
        log::info!("Using library API at {}", config.base_url);
        let registry = StoreRegistry::connect(&config)?;
        Ok(Self::new(registry, json))
    }
}

/// Turns a failure recorded by a store into an error for the command
pub fn recorded(store: &'static str, last_error: Option<ErrorInfo>) -> Result<(), Error> {
    last_error.map_or(Ok(()), |info| Err(Error::Recorded { store, info }))
}
