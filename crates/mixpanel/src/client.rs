//! Mixpanel client implementation.

use crate::builders::{EngageBuilder, TrackBuilder};
use crate::config::{Config, ConfigUpdate, MixpanelBuilder, Options};
use crate::transport::HttpTransport;
use crate::types::{Endpoint, Identity, Properties};
use crate::Error;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

/// Mutable per-client state.
#[derive(Debug, Clone, Default)]
struct ClientState {
    options: Options,
    identity: Identity,
}

/// Mixpanel tracking client.
///
/// Every `send` issues exactly one GET request; nothing is queued,
/// batched or retried. Identity set through [`identify`](Self::identify)
/// and [`set_name_tag`](Self::set_name_tag) sticks to all later events.
///
/// # Example
///
/// ```rust,no_run
/// use mixpanel::Mixpanel;
///
/// #[tokio::main]
/// async fn main() -> Result<(), mixpanel::Error> {
///     let client = Mixpanel::builder("project_token").build()?;
///
///     client.identify("user_42");
///     client.track("signup")
///         .property("plan", "pro")
///         .send()
///         .await?;
///
///     client.engage()
///         .property("$distinct_id", "user_42")
///         .property("$set", serde_json::json!({ "plan": "pro" }))
///         .send()
///         .await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Mixpanel {
    config: Config,
    state: RwLock<ClientState>,
    transport: Arc<HttpTransport>,
}

impl Mixpanel {
    /// Create a new builder with the given project token.
    pub fn builder(token: impl Into<String>) -> MixpanelBuilder {
        MixpanelBuilder::new(token)
    }

    /// Create a client with default settings.
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        Self::builder(token).build()
    }

    /// Create a new client from config.
    pub(crate) fn from_config(config: Config) -> Result<Self, Error> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        let state = ClientState {
            options: config.initial_options(),
            identity: Identity::default(),
        };

        Ok(Self {
            config,
            state: RwLock::new(state),
            transport,
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the project token.
    pub fn token(&self) -> &str {
        self.config.token()
    }

    /// Current runtime options.
    pub fn options(&self) -> Options {
        self.read_state().options
    }

    /// Current distinct id, if one was set.
    pub fn distinct_id(&self) -> Option<String> {
        self.read_state().identity.distinct_id.clone()
    }

    /// Current name tag, if one was set.
    pub fn name_tag(&self) -> Option<String> {
        self.read_state().identity.name_tag.clone()
    }

    // ============================================
    // CONFIG & IDENTITY
    // ============================================

    /// Override runtime options. Fields left unset keep their value.
    pub fn set_config(&self, update: ConfigUpdate) {
        self.write_state().options.apply(&update);
    }

    /// Identify the user; every later event carries this `distinct_id`.
    pub fn identify(&self, distinct_id: impl Into<String>) {
        self.write_state().identity.distinct_id = Some(distinct_id.into());
    }

    /// Attach a human-readable name to every later event as `mp_name_tag`.
    pub fn set_name_tag(&self, name: impl Into<String>) {
        self.write_state().identity.name_tag = Some(name.into());
    }

    // ============================================
    // TRACK
    // ============================================

    /// Track an event.
    ///
    /// ```rust,no_run
    /// # use mixpanel::Mixpanel;
    /// # async fn example(client: &Mixpanel) -> Result<(), mixpanel::Error> {
    /// client.track("feature_used")
    ///     .property("feature", "export")
    ///     .send()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn track(&self, event_name: impl Into<String>) -> SendableTrack<'_> {
        SendableTrack {
            builder: TrackBuilder::new(event_name),
            client: self,
        }
    }

    /// Track an event starting from an existing property map.
    pub fn track_with(
        &self,
        event_name: impl Into<String>,
        properties: Properties,
    ) -> SendableTrack<'_> {
        SendableTrack {
            builder: TrackBuilder::with_properties(event_name, properties),
            client: self,
        }
    }

    /// Track a funnel step as an `mp_funnel` event.
    ///
    /// `funnel`, `step` and `goal` replace any properties of the same name.
    pub fn track_funnel(
        &self,
        funnel: impl Into<String>,
        step: u32,
        goal: impl Into<String>,
    ) -> SendableTrack<'_> {
        SendableTrack {
            builder: TrackBuilder::funnel(funnel, step, goal),
            client: self,
        }
    }

    // ============================================
    // ENGAGE
    // ============================================

    /// Update a user profile.
    pub fn engage(&self) -> SendableEngage<'_> {
        self.engage_with(Properties::new())
    }

    /// Update a user profile from an existing property map.
    pub fn engage_with(&self, properties: Properties) -> SendableEngage<'_> {
        SendableEngage {
            builder: EngageBuilder::new(properties),
            client: self,
        }
    }

    // ============================================
    // INTERNAL
    // ============================================

    fn read_state(&self) -> RwLockReadGuard<'_, ClientState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, ClientState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot state and build a ready-to-send request.
    fn prepare_track(&self, builder: TrackBuilder) -> Result<PreparedRequest, Error> {
        let state = self.read_state().clone();
        let payload = builder.build(self.token(), &state.identity);
        let payload = serde_json::to_value(payload)?;

        if state.options.debug {
            info!(payload = %payload, "sending the following event to Mixpanel");
        }

        Ok(PreparedRequest {
            endpoint: Endpoint::Track,
            payload,
            options: state.options,
            transport: self.transport.clone(),
        })
    }

    fn prepare_engage(&self, builder: EngageBuilder) -> PreparedRequest {
        let options = self.options();
        let payload = Value::Object(builder.build(self.token()));

        if options.debug {
            info!(payload = %payload, "sending the following engage to Mixpanel");
        }

        PreparedRequest {
            endpoint: Endpoint::Engage,
            payload,
            options,
            transport: self.transport.clone(),
        }
    }
}

impl MixpanelBuilder {
    /// Build the Mixpanel client.
    pub fn build(self) -> Result<Mixpanel, Error> {
        let config = self.build_config()?;
        Mixpanel::from_config(config)
    }
}

// ============================================
// DISPATCH
// ============================================

/// A payload bound to its endpoint, detached from the client borrow.
struct PreparedRequest {
    endpoint: Endpoint,
    payload: Value,
    options: Options,
    transport: Arc<HttpTransport>,
}

impl PreparedRequest {
    async fn send(self) -> Result<(), Error> {
        self.transport
            .send(self.endpoint, &self.payload, self.options)
            .await
    }
}

/// Handle of the ambient tokio runtime, or `Error::NoRuntime`.
fn current_runtime() -> Result<Handle, Error> {
    Handle::try_current().map_err(|_| Error::NoRuntime)
}

/// Spawn a prepared request, or its preparation error, onto `runtime`.
fn spawn_prepared<T, F>(
    runtime: &Handle,
    request: Result<PreparedRequest, Error>,
    finish: F,
) -> JoinHandle<T>
where
    T: Send + 'static,
    F: FnOnce(Result<(), Error>) -> T + Send + 'static,
{
    runtime.spawn(async move {
        let result = match request {
            Ok(request) => request.send().await,
            Err(e) => Err(e),
        };
        finish(result)
    })
}

// ============================================
// SENDABLE WRAPPERS
// ============================================

/// Sendable track event builder.
pub struct SendableTrack<'a> {
    builder: TrackBuilder,
    client: &'a Mixpanel,
}

impl<'a> SendableTrack<'a> {
    /// Add a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builder = self.builder.property(key, value);
        self
    }

    /// Merge a property map.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.builder = self.builder.properties(properties);
        self
    }

    /// Send the event and wait for the server's answer.
    pub async fn send(self) -> Result<(), Error> {
        self.client.prepare_track(self.builder)?.send().await
    }

    /// Send the event in the background and return immediately.
    ///
    /// Fails with [`Error::NoRuntime`] outside a tokio runtime; nothing is sent then.
    pub fn send_detached(self) -> Result<JoinHandle<Result<(), Error>>, Error> {
        let runtime = current_runtime()?;
        let request = self.client.prepare_track(self.builder);
        Ok(spawn_prepared(&runtime, request, |result| result))
    }

    /// Send the event in the background and hand the outcome to `callback`.
    ///
    /// Fails with [`Error::NoRuntime`] outside a tokio runtime, in which case
    /// `callback` is dropped without being called.
    pub fn send_with<F>(self, callback: F) -> Result<JoinHandle<()>, Error>
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        let runtime = current_runtime()?;
        let request = self.client.prepare_track(self.builder);
        Ok(spawn_prepared(&runtime, request, callback))
    }
}

/// Sendable profile update builder.
pub struct SendableEngage<'a> {
    builder: EngageBuilder,
    client: &'a Mixpanel,
}

impl<'a> SendableEngage<'a> {
    /// Add a property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.builder = self.builder.property(key, value);
        self
    }

    /// Merge a property map.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.builder = self.builder.properties(properties);
        self
    }

    /// Send the update and wait for the server's answer.
    pub async fn send(self) -> Result<(), Error> {
        self.client.prepare_engage(self.builder).send().await
    }

    /// Send the update in the background and return immediately.
    ///
    /// Fails with [`Error::NoRuntime`] outside a tokio runtime; nothing is sent then.
    pub fn send_detached(self) -> Result<JoinHandle<Result<(), Error>>, Error> {
        let runtime = current_runtime()?;
        let request = Ok(self.client.prepare_engage(self.builder));
        Ok(spawn_prepared(&runtime, request, |result| result))
    }

    /// Send the update in the background and hand the outcome to `callback`.
    ///
    /// Fails with [`Error::NoRuntime`] outside a tokio runtime, in which case
    /// `callback` is dropped without being called.
    pub fn send_with<F>(self, callback: F) -> Result<JoinHandle<()>, Error>
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        let runtime = current_runtime()?;
        let request = Ok(self.client.prepare_engage(self.builder));
        Ok(spawn_prepared(&runtime, request, callback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn client() -> Mixpanel {
        Mixpanel::new("tok").unwrap()
    }

    #[test]
    fn test_new_requires_token() {
        assert!(matches!(Mixpanel::new(""), Err(Error::InvalidArgument(_))));
        assert_eq!(client().token(), "tok");
    }

    #[test]
    fn test_initial_options_come_from_builder() {
        let client = Mixpanel::builder("tok").test(true).build().unwrap();
        assert_eq!(
            client.options(),
            Options {
                test: true,
                debug: false
            }
        );
    }

    #[test]
    fn test_set_config_overwrites_and_is_idempotent() {
        let client = client();
        let update = ConfigUpdate::new().test(true).debug(true);

        client.set_config(update);
        let once = client.options();
        client.set_config(update);

        assert_eq!(client.options(), once);
        assert!(once.test && once.debug);

        client.set_config(ConfigUpdate::new().debug(false));
        assert!(client.options().test);
        assert!(!client.options().debug);
    }

    #[test]
    fn test_identity_is_sticky_until_changed() {
        let client = client();
        assert_eq!(client.distinct_id(), None);

        client.identify("u1");
        client.set_name_tag("Bob");
        assert_eq!(client.distinct_id().as_deref(), Some("u1"));
        assert_eq!(client.name_tag().as_deref(), Some("Bob"));

        client.identify("u2");
        assert_eq!(client.distinct_id().as_deref(), Some("u2"));
        assert_eq!(client.name_tag().as_deref(), Some("Bob"));
    }

    #[test]
    fn test_prepare_track_snapshots_identity() {
        let client = client();
        client.identify("u1");

        let request = client.prepare_track(TrackBuilder::new("e")).unwrap();
        client.identify("u2");

        assert_eq!(request.endpoint, Endpoint::Track);
        assert_eq!(request.payload["properties"]["distinct_id"], "u1");
    }

    #[test]
    fn test_prepare_engage_is_flat() {
        let client = client();
        let request = client.prepare_engage(EngageBuilder::default());

        assert_eq!(request.endpoint, Endpoint::Engage);
        assert_eq!(request.payload, serde_json::json!({ "$token": "tok" }));
    }

    #[test]
    fn test_background_send_without_runtime_returns_error() {
        let client = client();
        let called = Arc::new(AtomicBool::new(false));

        let flag = called.clone();
        let result = client.track("e").send_with(move |_| {
            flag.store(true, Ordering::SeqCst);
        });
        assert!(matches!(result, Err(Error::NoRuntime)));
        assert!(!called.load(Ordering::SeqCst));

        assert!(matches!(
            client.track("e").send_detached(),
            Err(Error::NoRuntime)
        ));
        assert!(matches!(
            client.engage().send_detached(),
            Err(Error::NoRuntime)
        ));
        assert!(matches!(
            client.engage().send_with(|_| {}),
            Err(Error::NoRuntime)
        ));
    }

    #[test]
    fn test_client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Mixpanel>();
    }
}
