//! Per-request cache of decoded request bodies.
//!
//! Middleware and handlers often want the same body more than once (say, an audit
//! middleware and the handler both reading JSON). [`BodyCache`] decodes each representation
//! at most once and lives exactly as long as the request it belongs to.

use std::sync::OnceLock;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::Query;
use crate::Error;

/// Lazily decoded views of one request body.
#[derive(Debug, Default)]
pub struct BodyCache {
    raw: Bytes,
    text: OnceLock<String>,
    json: OnceLock<Value>,
    urlencoded: OnceLock<Query>,
}

impl BodyCache {
    /// Wraps the raw body bytes.
    pub fn new(raw: Bytes) -> Self {
        Self {
            raw,
            ..Self::default()
        }
    }

    /// The raw body.
    pub fn bytes(&self) -> &Bytes {
        &self.raw
    }

    /// The body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Body`] if the body is not valid UTF-8.
    pub fn text(&self) -> Result<&str, Error> {
        if let Some(text) = self.text.get() {
            return Ok(text);
        }
        let text = std::str::from_utf8(&self.raw)
            .map_err(|e| Error::Body(e.to_string()))?
            .to_owned();
        Ok(self.text.get_or_init(|| text))
    }

    /// The body parsed as JSON, then deserialized into `T`.
    ///
    /// Parsing happens once; every call deserializes from the cached document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Body`] if the body is not JSON, or [`Error::Json`] if the document
    /// does not fit `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let value = match self.json.get() {
            Some(value) => value,
            None => {
                let parsed: Value = serde_json::from_slice(&self.raw)
                    .map_err(|e| Error::Body(e.to_string()))?;
                self.json.get_or_init(|| parsed)
            }
        };
        Ok(T::deserialize(value)?)
    }

    /// The body decoded as `application/x-www-form-urlencoded` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Body`] if the body is not valid UTF-8.
    pub fn urlencoded(&self) -> Result<&Query, Error> {
        if let Some(form) = self.urlencoded.get() {
            return Ok(form);
        }
        let form = Query::parse(self.text()?);
        Ok(self.urlencoded.get_or_init(|| form))
    }
}
