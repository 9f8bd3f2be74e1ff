//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::errors::{Result, WizardError};

#[derive(Debug, Clone)]
pub struct Config {
    /// Backing database for the draft key-value store
    pub database_url: String,
    /// Port for the wizard REST API
    pub api_port: u16,
    /// Endpoint of the create-donation-event service
    pub create_event_url: String,
    /// Bearer token forwarded to the create-donation-event service
    pub api_token: Option<String>,
    /// Quiet period before an edit is written to the draft store
    pub draft_debounce_ms: u64,
    /// Estimated capacity of the draft store, in bytes
    pub storage_quota_bytes: usize,
    /// How long the success notice stays up before navigating away
    pub redirect_delay_ms: u64,
    /// Where to navigate after a successful submission
    pub redirect_route: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./campaign_drafts.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3002".to_string())
                .parse()
                .map_err(|_| WizardError::Config("Invalid API_PORT".to_string()))?,
            create_event_url: env_var("CREATE_EVENT_URL").map_err(|_| {
                WizardError::Config("CREATE_EVENT_URL environment variable is required".to_string())
            })?,
            api_token: env_var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            draft_debounce_ms: env_var("DRAFT_DEBOUNCE_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .map_err(|_| WizardError::Config("Invalid DRAFT_DEBOUNCE_MS".to_string()))?,
            storage_quota_bytes: env_var("STORAGE_QUOTA_BYTES")
                .unwrap_or_else(|_| "5242880".to_string())
                .parse()
                .map_err(|_| WizardError::Config("Invalid STORAGE_QUOTA_BYTES".to_string()))?,
            redirect_delay_ms: env_var("REDIRECT_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| WizardError::Config("Invalid REDIRECT_DELAY_MS".to_string()))?,
            redirect_route: env_var("REDIRECT_ROUTE")
                .unwrap_or_else(|_| "/dashboard/ngo".to_string()),
        })
    }

    pub fn draft_debounce(&self) -> Duration {
        Duration::from_millis(self.draft_debounce_ms)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| WizardError::Config(format!("Missing env var: {key}")))
}
