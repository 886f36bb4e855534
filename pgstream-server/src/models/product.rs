//! Product rows
//!
//! The `products` table schema is owned elsewhere, so a product is carried
//! as the JSON object the database produced for it. Column order and value
//! encoding are whatever `row_to_json` emits; nothing is re-encoded here.

use serde::Serialize;
use serde_json::value::RawValue;

/// A single product row, serialized as a JSON object
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct Product(Box<RawValue>);

impl Product {
    /// Wrap the JSON text of one row.
    ///
    /// Fails if the text is not valid JSON or is not an object.
    pub fn from_json_text(text: String) -> Result<Self, serde_json::Error> {
        let raw = RawValue::from_string(text)?;
        if !raw.get().trim_start().starts_with('{') {
            return Err(serde::de::Error::custom("product row is not a JSON object"));
        }
        Ok(Self(raw))
    }

    /// The row's JSON text, exactly as it is written to clients.
    pub fn as_json(&self) -> &str {
        self.0.get()
    }
}
