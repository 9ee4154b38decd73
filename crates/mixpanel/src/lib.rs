//! Minimal Mixpanel tracking client for Rust.
//!
//! Each call builds one JSON payload, base64-encodes it into the `data`
//! query parameter and issues a single GET request. The API answers `1`
//! when it accepted the payload; anything else surfaces as
//! [`Error::ServerRejection`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mixpanel::{ConfigUpdate, Mixpanel};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mixpanel::Error> {
//!     let client = Mixpanel::builder("project_token").debug(true).build()?;
//!
//!     client.identify("user_42");
//!     client.set_name_tag("Ada");
//!
//!     client.track("signup")
//!         .property("plan", "pro")
//!         .send()
//!         .await?;
//!
//!     client.track_funnel("onboarding", 2, "profile_filled")
//!         .send_with(|result| {
//!             if let Err(e) = result {
//!                 eprintln!("funnel step not recorded: {e}");
//!             }
//!         })?;
//!
//!     client.set_config(ConfigUpdate::new().test(true));
//!     Ok(())
//! }
//! ```

mod builders;
mod client;
mod config;
mod error;
mod transport;
mod types;

pub use builders::FUNNEL_EVENT;
pub use client::{Mixpanel, SendableEngage, SendableTrack};
pub use config::{Config, ConfigUpdate, MixpanelBuilder, Options, DEFAULT_API_HOST};
pub use error::Error;
pub use transport::{encode_data, SUCCESS_BODY};
pub use types::{Endpoint, EventPayload, Properties};
