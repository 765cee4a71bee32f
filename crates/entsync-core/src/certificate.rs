//! Entitlement certificate model
//!
//! An entitlement certificate payload is PEM text holding a `CERTIFICATE`
//! block (the signed X.509 body, carried opaquely) followed by an
//! `ENTITLEMENT DATA` block whose decoded contents are JSON describing the
//! serial, validity window, order, products and content sets. The key payload
//! is a PEM `PRIVATE KEY` block.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const ENTITLEMENT_DATA_LABEL: &str = "ENTITLEMENT DATA";

/// The order (subscription purchase) an entitlement was granted from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub name: String,
    #[serde(default)]
    pub contract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
}

/// A product provided by an entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
}

/// A content set an entitlement grants access to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Content {
    /// Content type tag, e.g. `yum` or `ostree`
    #[serde(rename = "type")]
    pub content_type: String,
    pub label: String,
    #[serde(default)]
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpg_url: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct EntitlementData {
    serial: u64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    order: Order,
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    content: Vec<Content>,
}

/// An entitlement certificate, identified solely by its serial.
#[derive(Debug, Clone, Serialize)]
pub struct Certificate {
    pub serial: u64,
    pub order: Order,
    pub products: Vec<Product>,
    pub content: Vec<Content>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Where the certificate lives once written to the store
    pub path: Option<PathBuf>,
    #[serde(skip)]
    pem: String,
}

impl Certificate {
    /// Decode a certificate payload.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let blocks = pem_blocks(pem).map_err(|message| Error::CertificateParse { message })?;

        if !blocks.iter().any(|b| b.tag() == CERTIFICATE_LABEL) {
            return Err(Error::CertificateParse {
                message: "no CERTIFICATE block".to_string(),
            });
        }
        let data_block = blocks
            .iter()
            .find(|b| b.tag() == ENTITLEMENT_DATA_LABEL)
            .ok_or_else(|| Error::CertificateParse {
                message: "no ENTITLEMENT DATA block".to_string(),
            })?;

        let data: EntitlementData =
            serde_json::from_slice(data_block.contents()).map_err(|e| Error::CertificateParse {
                message: format!("entitlement data is not valid JSON: {}", e),
            })?;

        if data.end < data.start {
            return Err(Error::CertificateParse {
                message: format!("serial {} ends before it starts", data.serial),
            });
        }

        Ok(Self {
            serial: data.serial,
            order: data.order,
            products: data.products,
            content: data.content,
            start: data.start,
            end: data.end,
            path: None,
            pem: pem.to_string(),
        })
    }

    /// Attach the on-disk location.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The raw certificate payload.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether `at` falls inside the validity window (inclusive).
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// Content sets carrying the given type tag.
    pub fn content_of_type<'a>(&'a self, content_type: &'a str) -> impl Iterator<Item = &'a Content> {
        self.content
            .iter()
            .filter(move |c| c.content_type == content_type)
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for Certificate {}

/// A private key payload.
#[derive(Clone)]
pub struct PrivateKey {
    pem: String,
}

impl PrivateKey {
    /// Validate that the payload holds a PEM private key block.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let blocks = pem_blocks(pem).map_err(|message| Error::KeyParse { message })?;
        let has_key = blocks.iter().any(|b| b.tag().ends_with("PRIVATE KEY"));
        if !has_key {
            return Err(Error::KeyParse {
                message: "no PRIVATE KEY block".to_string(),
            });
        }
        Ok(Self {
            pem: pem.to_string(),
        })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// Parse every PEM block in `text`; at least one is required.
fn pem_blocks(text: &str) -> std::result::Result<Vec<pem::Pem>, String> {
    let blocks = pem::parse_many(text).map_err(|e| e.to_string())?;
    if blocks.is_empty() {
        return Err("no PEM blocks found".to_string());
    }
    Ok(blocks)
}
