//! The textual control surface.
//!
//! An external driver (an OS control channel, outside this crate) presents
//! a state toggle holding `start` or `stop`. The [`Controller`] consumes
//! the written values: a value equal to the current state is a no-op,
//! `start` brings the framework up against a configuration buffer, `stop`
//! tears it down, anything else is rejected.

use std::str::FromStr;

use strum_macros::{AsRefStr, Display, EnumString};
use tracing::info;

use crate::error::ConfigError;
use crate::registry::ModuleRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StateCommand {
    Start,
    Stop,
}

/// Drives a [`ModuleRegistry`] from textual state-change commands.
pub struct Controller {
    registry: ModuleRegistry,
}

impl Controller {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    /// Apply one state value written by the external driver.
    ///
    /// `cfg_text` is the configuration buffer used if the command turns
    /// out to be `start`; reading it from disk is the caller's business.
    #[tracing::instrument(level = "info", skip(self, cfg_text))]
    pub fn handle_state_change(
        &mut self,
        new_state: &str,
        cfg_text: &str,
    ) -> Result<(), ConfigError> {
        let cmd = StateCommand::from_str(new_state.trim()).map_err(|_| {
            ConfigError::InvalidCommand {
                value: new_state.to_string(),
            }
        })?;
        info!(state = %cmd, "got state change");

        match (cmd, self.registry.is_running()) {
            (StateCommand::Start, true) | (StateCommand::Stop, false) => {
                info!(state = %cmd, "state isn't changed, nothing to do");
                Ok(())
            }
            (StateCommand::Start, false) => {
                info!("starting all modules");
                self.registry.start_all(cfg_text)
            }
            (StateCommand::Stop, true) => {
                info!("stopping all modules");
                self.registry.stop_all();
                Ok(())
            }
        }
    }
}
