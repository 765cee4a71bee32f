//! Blocking HTTP implementation of [`EntitlementSource`]

use std::path::Path;
use std::time::Duration;

use entsync_core::{CertificateBundle, ConsumerIdentity, EntitlementSource, ServerSettings};
use reqwest::StatusCode;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct SerialEntry {
    serial: u64,
}

/// Error bodies carry a human-readable `displayMessage`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    display_message: String,
}

/// Entitlement server client authenticated with the consumer identity.
#[derive(Debug, Clone)]
pub struct HttpEntitlementSource {
    base_url: String,
    client: Client,
}

impl HttpEntitlementSource {
    /// Use a preconfigured client.
    pub fn new(base_url: impl Into<String>, client: Client) -> Result<Self> {
        let base_url = base_url.into();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidUrl { url: base_url });
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build a client from the `[server]` settings.
    ///
    /// The consumer certificate and key are presented as the TLS client
    /// identity; `ca_cert`, when set, is trusted in addition to the system
    /// roots.
    pub fn from_settings(settings: &ServerSettings) -> Result<Self> {
        let mut identity_pem = read_pem(&settings.consumer_cert)?;
        identity_pem.extend_from_slice(b"\n");
        identity_pem.extend(read_pem(&settings.consumer_key)?);
        let identity =
            reqwest::Identity::from_pem(&identity_pem).map_err(|e| Error::Identity {
                path: settings.consumer_cert.clone(),
                message: e.to_string(),
            })?;

        let mut builder = Client::builder().use_rustls_tls().identity(identity);

        if let Some(ca_path) = &settings.ca_cert {
            let ca = reqwest::Certificate::from_pem(&read_pem(ca_path)?).map_err(|e| {
                Error::CaCertificate {
                    path: ca_path.clone(),
                    message: e.to_string(),
                }
            })?;
            builder = builder.add_root_certificate(ca);
        }
        if let Some(secs) = settings.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Self::new(&settings.url, builder.build()?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<T: DeserializeOwned>(
        &self,
        consumer: &ConsumerIdentity,
        path: &str,
        query: &[(&str, String)],
    ) -> entsync_core::Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .map_err(|e| transport_error(&url, e))?;

        let body = check_status(consumer, response)?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl EntitlementSource for HttpEntitlementSource {
    fn expected_serials(&self, consumer: &ConsumerIdentity) -> entsync_core::Result<Vec<u64>> {
        let entries: Vec<SerialEntry> = self.get(
            consumer,
            &format!("/consumers/{}/certificates/serials", consumer),
            &[],
        )?;
        Ok(entries.into_iter().map(|e| e.serial).collect())
    }

    fn certificate_bundles(
        &self,
        consumer: &ConsumerIdentity,
        serials: &[u64],
    ) -> entsync_core::Result<Vec<CertificateBundle>> {
        let list = serials
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.get(
            consumer,
            &format!("/consumers/{}/certificates", consumer),
            &[("serials", list)],
        )
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>> {
    Ok(entsync_fs::io::read_text(path)?.into_bytes())
}

fn transport_error(url: &str, err: reqwest::Error) -> entsync_core::Error {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    tracing::debug!(url = %url, "Request {}: {}", kind, err);
    entsync_core::Error::Disconnected {
        message: format!("{} ({}): {}", url, kind, err),
    }
}

/// Map the response status onto the engine's error classes.
fn check_status(consumer: &ConsumerIdentity, response: Response) -> entsync_core::Result<String> {
    let status = response.status();
    let url = response.url().to_string();
    let body = response
        .text()
        .map_err(|e| transport_error(&url, e))?;

    if status.is_success() {
        return Ok(body);
    }

    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.display_message)
        .unwrap_or_else(|_| body.trim().to_string());

    Err(match status {
        StatusCode::GONE => entsync_core::Error::Gone {
            consumer: consumer.to_string(),
            message,
        },
        StatusCode::UNAUTHORIZED => entsync_core::Error::IdentityExpired { message },
        other => entsync_core::Error::Remote {
            status: other.as_u16(),
            message,
        },
    })
}
