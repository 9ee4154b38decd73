//! HTTP transport for sending payloads.

use crate::config::{Config, Options};
use crate::types::Endpoint;
use crate::Error;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Body the API returns when a payload was accepted.
pub const SUCCESS_BODY: &str = "1";

/// HTTP transport for sending payloads to the Mixpanel API.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_host: String,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: &Config) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_host: config.api_host().to_string(),
        })
    }

    /// Full URL of an endpoint, without the query string.
    pub fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.api_host, endpoint.path())
    }

    /// Send one payload as a single GET request.
    #[instrument(skip(self, payload))]
    pub async fn send<T: Serialize + ?Sized>(
        &self,
        endpoint: Endpoint,
        payload: &T,
        options: Options,
    ) -> Result<(), Error> {
        let params = query_params(encode_data(payload)?, options.test);

        let response = self
            .client
            .get(self.url(endpoint))
            .query(&params)
            .send()
            .await;

        let body = match response {
            Ok(response) => response.text().await,
            Err(e) => Err(e),
        };

        let body = match body {
            Ok(body) => body,
            Err(e) => {
                if options.debug {
                    warn!(endpoint = %endpoint, error = %e, "got error");
                }
                return Err(Error::Http(e));
            }
        };

        if body != SUCCESS_BODY {
            if options.debug {
                warn!(endpoint = %endpoint, body = %body, "server rejected payload");
            }
            return Err(Error::ServerRejection(body));
        }

        if options.debug {
            debug!(endpoint = %endpoint, "payload accepted");
        }

        Ok(())
    }
}

/// Serialize a payload to JSON and encode it as base64.
pub fn encode_data<T: Serialize + ?Sized>(payload: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(payload)?;
    Ok(STANDARD.encode(json))
}

/// Query parameters for a request carrying `data`.
pub(crate) fn query_params(data: String, test: bool) -> Vec<(&'static str, String)> {
    let mut params = vec![("data", data), ("ip", "0".to_string())];
    if test {
        params.push(("test", "1".to_string()));
    }
    params
}
