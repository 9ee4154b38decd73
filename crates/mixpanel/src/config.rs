//! Client configuration.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Default API host.
pub const DEFAULT_API_HOST: &str = "http://api.mixpanel.com";

/// Runtime options that can be changed after construction via
/// [`Mixpanel::set_config`](crate::Mixpanel::set_config).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Append `test=1` to outgoing requests.
    pub test: bool,
    /// Log outgoing payloads and transport errors.
    pub debug: bool,
}

impl Options {
    /// Copy every override present in `update` onto these options.
    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(test) = update.test {
            self.test = test;
        }
        if let Some(debug) = update.debug {
            self.debug = debug;
        }
    }
}

/// A set of option overrides. Fields left as `None` are untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigUpdate {
    /// New value for [`Options::test`].
    #[serde(default)]
    pub test: Option<bool>,
    /// New value for [`Options::debug`].
    #[serde(default)]
    pub debug: Option<bool>,
}

impl ConfigUpdate {
    /// Create an update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override test mode.
    pub fn test(mut self, enabled: bool) -> Self {
        self.test = Some(enabled);
        self
    }

    /// Override debug mode.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = Some(enabled);
        self
    }

    /// Parse overrides from a JSON object such as `{"test": true}`.
    ///
    /// Keys other than `test` and `debug` are rejected.
    pub fn from_json(value: Value) -> Result<Self, crate::Error> {
        serde_json::from_value(value).map_err(|e| crate::Error::InvalidArgument(e.to_string()))
    }
}

/// Mixpanel client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) token: String,
    pub(crate) api_host: String,
    pub(crate) timeout: Option<Duration>,
    pub(crate) options: Options,
}

impl Config {
    /// Get the project token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the API host, including scheme and optional port.
    pub fn api_host(&self) -> &str {
        &self.api_host
    }

    /// Get the request timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Get the options the client was built with.
    pub fn initial_options(&self) -> Options {
        self.options
    }
}

/// Builder for the Mixpanel client.
#[derive(Debug)]
pub struct MixpanelBuilder {
    token: String,
    api_host: Option<String>,
    timeout: Option<Duration>,
    options: Options,
}

impl MixpanelBuilder {
    /// Create a new builder with the given project token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_host: None,
            timeout: None,
            options: Options::default(),
        }
    }

    /// Set the API host, e.g. `http://127.0.0.1:8080`.
    pub fn api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Set a request timeout. Without one the transport defaults apply.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable test mode.
    pub fn test(mut self, enabled: bool) -> Self {
        self.options.test = enabled;
        self
    }

    /// Enable or disable debug logging.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.options.debug = enabled;
        self
    }

    /// Apply a whole set of overrides at once.
    pub fn config(mut self, update: ConfigUpdate) -> Self {
        self.options.apply(&update);
        self
    }

    /// Build the configuration.
    pub(crate) fn build_config(self) -> Result<Config, crate::Error> {
        if self.token.is_empty() {
            return Err(crate::Error::InvalidArgument(
                "the Mixpanel client needs a Mixpanel token".into(),
            ));
        }

        let api_host = self
            .api_host
            .unwrap_or_else(|| DEFAULT_API_HOST.into())
            .trim_end_matches('/')
            .to_string();

        Ok(Config {
            token: self.token,
            api_host,
            timeout: self.timeout,
            options: self.options,
        })
    }
}
