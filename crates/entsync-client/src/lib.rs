//! HTTP entitlement source
//!
//! Talks to the entitlement server's consumer certificate endpoints with a
//! blocking `reqwest` client authenticated by the consumer identity.
//! Transport failures surface as
//! [`Disconnected`](entsync_core::Error::Disconnected), `410 Gone` as
//! [`Gone`](entsync_core::Error::Gone) and `401` as
//! [`IdentityExpired`](entsync_core::Error::IdentityExpired).

pub mod error;
pub mod http;

pub use error::{Error, Result};
pub use http::HttpEntitlementSource;
