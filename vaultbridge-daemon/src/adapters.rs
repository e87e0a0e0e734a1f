//! Dispatches the daemon's `/api/adapters/:platform/*` routes to the
//! concrete connector. A small struct of concrete `Arc`s
//! rather than a `HashMap<String, Arc<dyn PlatformConnector>>` because the
//! Teams connector needs its background refresh loop spawned with its
//! concrete type (`teams::spawn_refresh_loop` takes `Arc<TeamsConnector>`,
//! not a trait object).

use std::sync::Arc;

use vaultbridge_adapters::connectors::{discord::DiscordConnector, slack::SlackConnector, teams, teams::TeamsConnector, whatsapp::WhatsAppConnector};
use vaultbridge_adapters::{AdapterError, AdapterErrorCode, PlatformConnector};

pub struct AdapterRegistry {
    slack: Arc<SlackConnector>,
    discord: Arc<DiscordConnector>,
    teams: Arc<TeamsConnector>,
    whatsapp: Arc<WhatsAppConnector>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            slack: Arc::new(SlackConnector::new()),
            discord: Arc::new(DiscordConnector::new()),
            teams: Arc::new(TeamsConnector::new()),
            whatsapp: Arc::new(WhatsAppConnector::new()),
        }
    }

    /// Looks up `platform` as a trait object for the uniform lifecycle/
    /// messaging routes.
    pub fn get(&self, platform: &str) -> Result<Arc<dyn PlatformConnector>, AdapterError> {
        match platform {
            "slack" => Ok(self.slack.clone() as Arc<dyn PlatformConnector>),
            "discord" => Ok(self.discord.clone() as Arc<dyn PlatformConnector>),
            "teams" => Ok(self.teams.clone() as Arc<dyn PlatformConnector>),
            "whatsapp" => Ok(self.whatsapp.clone() as Arc<dyn PlatformConnector>),
            other => Err(AdapterError::new(AdapterErrorCode::InvalidTarget, format!("unknown platform '{other}'"))),
        }
    }

    /// Called once `teams.start()` has succeeded — starts the 30-minute
    /// background token-refresh loop. A no-op for every other platform.
    pub fn on_started(&self, platform: &str) {
        if platform == "teams" {
            teams::spawn_refresh_loop(self.teams.clone());
        }
    }

    pub fn platforms(&self) -> &'static [&'static str] {
        &["slack", "discord", "teams", "whatsapp"]
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
