use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::duration::SignedDuration;
use crate::{Error, Result};

pub(crate) const ENV_DEFAULT_PUBLISH_TIMEOUT: &str = "PUBSINK_DEFAULT_PUBLISH_TIMEOUT";
pub(crate) const ENV_DRAIN_ON_CLOSE: &str = "PUBSINK_DRAIN_ON_CLOSE";

const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(1);

/// Knobs shared by every sink a registry opens.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Deadline of a single publish when the sink URL has no `publishTimeout`.
    pub default_publish_timeout: SignedDuration,
    /// Wait for in-flight publishes before releasing resources on close. Each publish is
    /// bounded by its own deadline, so the wait is too.
    pub drain_on_close: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_publish_timeout: DEFAULT_PUBLISH_TIMEOUT.into(),
            drain_on_close: true,
        }
    }
}

impl Settings {
    /// Load the settings from the process environment, falling back to the defaults for
    /// variables that are not set.
    pub fn load() -> Result<Self> {
        let vars: HashMap<String, String> = env::vars().collect();
        vars.try_into()
    }

    pub fn with_default_publish_timeout(mut self, timeout: impl Into<SignedDuration>) -> Self {
        self.default_publish_timeout = timeout.into();
        self
    }

    pub fn with_drain_on_close(mut self, drain: bool) -> Self {
        self.drain_on_close = drain;
        self
    }
}

impl TryFrom<HashMap<String, String>> for Settings {
    type Error = Error;

    fn try_from(env_vars: HashMap<String, String>) -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(timeout) = env_vars.get(ENV_DEFAULT_PUBLISH_TIMEOUT) {
            settings.default_publish_timeout = timeout.parse().map_err(|e| match e {
                Error::Configuration(msg) => {
                    Error::Configuration(format!("{ENV_DEFAULT_PUBLISH_TIMEOUT}: {msg}"))
                }
                other => other,
            })?;
        }

        if let Some(drain) = env_vars.get(ENV_DRAIN_ON_CLOSE) {
            settings.drain_on_close = drain.parse().map_err(|_| {
                Error::Configuration(format!(
                    "{ENV_DRAIN_ON_CLOSE} must be true or false, got {drain:?}"
                ))
            })?;
        }

        Ok(settings)
    }
}
