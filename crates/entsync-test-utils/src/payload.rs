//! Entitlement certificate payload builders.

use pem::Pem;
use serde_json::{Value, json};

/// A validity window that contains "now" for any realistic test run.
pub const CURRENT_START: &str = "2020-01-01T00:00:00Z";
pub const CURRENT_END: &str = "2099-12-31T23:59:59Z";

/// Builds entitlement certificate payloads.
///
/// ```rust
/// use entsync_test_utils::EntitlementBuilder;
///
/// let pem = EntitlementBuilder::new(100)
///     .order("Awesome OS", "C-1")
///     .ostree_content("awesome-os", "https://cdn.example.com/ostree")
///     .cert_pem();
/// assert!(pem.contains("ENTITLEMENT DATA"));
/// ```
#[derive(Debug, Clone)]
pub struct EntitlementBuilder {
    serial: u64,
    order: Value,
    products: Vec<Value>,
    content: Vec<Value>,
    start: String,
    end: String,
}

impl EntitlementBuilder {
    pub fn new(serial: u64) -> Self {
        Self {
            serial,
            order: json!({ "name": format!("Subscription {}", serial), "contract": format!("{}", serial * 10) }),
            products: Vec::new(),
            content: Vec::new(),
            start: CURRENT_START.to_string(),
            end: CURRENT_END.to_string(),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn order(mut self, name: &str, contract: &str) -> Self {
        self.order = json!({ "name": name, "contract": contract });
        self
    }

    pub fn product(mut self, id: &str, name: &str) -> Self {
        self.products.push(json!({ "id": id, "name": name }));
        self
    }

    /// Add a product carrying an OS brand.
    pub fn os_brand(mut self, id: &str, name: &str, brand_name: &str) -> Self {
        self.products.push(json!({
            "id": id,
            "name": name,
            "brand_type": "OS",
            "brand_name": brand_name,
        }));
        self
    }

    pub fn content(mut self, content_type: &str, label: &str, url: &str) -> Self {
        self.content.push(json!({
            "type": content_type,
            "label": label,
            "name": label,
            "url": url,
        }));
        self
    }

    pub fn ostree_content(self, label: &str, url: &str) -> Self {
        self.content("ostree", label, url)
    }

    /// Validity window as RFC 3339 timestamps.
    pub fn valid_between(mut self, start: &str, end: &str) -> Self {
        self.start = start.to_string();
        self.end = end.to_string();
        self
    }

    /// A window that ended long ago.
    pub fn expired(self) -> Self {
        self.valid_between("2000-01-01T00:00:00Z", "2001-01-01T00:00:00Z")
    }

    /// The JSON carried in the `ENTITLEMENT DATA` block.
    pub fn data(&self) -> Value {
        json!({
            "serial": self.serial,
            "start": self.start,
            "end": self.end,
            "order": self.order,
            "products": self.products,
            "content": self.content,
        })
    }

    /// The certificate payload.
    pub fn cert_pem(&self) -> String {
        pem::encode_many(&[
            Pem::new("CERTIFICATE", format!("x509 body for serial {}", self.serial).into_bytes()),
            Pem::new("ENTITLEMENT DATA", self.data().to_string().into_bytes()),
        ])
    }

    pub fn key_pem(&self) -> String {
        key_pem(self.serial)
    }

    /// A server-style bundle object: `{"cert": ..., "key": ...}`.
    pub fn bundle_json(&self) -> Value {
        json!({ "cert": self.cert_pem(), "key": self.key_pem() })
    }
}

/// A syntactically valid private key payload.
pub fn key_pem(serial: u64) -> String {
    pem::encode(&Pem::new(
        "PRIVATE KEY",
        format!("key material for serial {}", serial).into_bytes(),
    ))
}
