use std::collections::HashMap;
use std::env;

pub use chatnote_core::config::{AppConfig, ConfigError, NotesApiConfig};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    /// Run the folder watcher in-process, sharing the engine with the routes
    pub watch: bool,
    pub app: AppConfig,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let app = AppConfig::from_lookup(&lookup)?;
        if app.notes.is_none() {
            return Err(ConfigError::MissingVar("NOTES_API_URL"));
        }

        let bind_addr = lookup("CHATNOTE_API_BIND_ADDR")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let watch = match lookup("CHATNOTE_API_WATCH")
            .map(|value| value.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("" | "0" | "false" | "no" | "off") => false,
            Some("1" | "true" | "yes" | "on") => true,
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "CHATNOTE_API_WATCH must be true or false, got {other}"
                )))
            }
        };

        Ok(Self {
            bind_addr,
            watch,
            app,
        })
    }

    pub fn notes(&self) -> Option<&NotesApiConfig> {
        self.app.notes.as_ref()
    }
}
