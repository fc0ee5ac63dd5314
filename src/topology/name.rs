//! # Embed Names
//!
//! The container passes initial wiring to the embedded context through the context's
//! name string:
//!
//! ```text
//! __frame_link__<tag>__<base64url(json)>
//! ```
//!
//! The JSON payload is an object with two optional fields, `id` (component instance
//! id) and `sibling` (index of the frame inside the container that actually owns the
//! component). Tags must be non-empty and must not contain `__`.

use crate::error::ComponentError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

const PREFIX: &str = "__frame_link__";
const SEPARATOR: &str = "__";

/// Decoded name string of an embedded context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedName {
    pub tag: String,
    pub id: Option<String>,
    pub sibling: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct NamePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sibling: Option<usize>,
}

impl EmbedName {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            id: None,
            sibling: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Marks the component as rendered by the container's `index`-th frame.
    pub fn rendered_by_sibling(mut self, index: usize) -> Self {
        self.sibling = Some(index);
        self
    }

    pub fn decode(name: &str) -> Result<Self, ComponentError> {
        let rest = name
            .strip_prefix(PREFIX)
            .ok_or_else(|| ComponentError::NotEmbedded(format!("name {name:?} has no {PREFIX} prefix")))?;
        let (tag, encoded) = rest
            .split_once(SEPARATOR)
            .ok_or_else(|| ComponentError::NotEmbedded(format!("name {name:?} has no payload")))?;
        if tag.is_empty() {
            return Err(ComponentError::NotEmbedded("empty tag".to_string()));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| ComponentError::NotEmbedded(format!("[{tag}] bad payload encoding: {e}")))?;
        let payload: NamePayload = serde_json::from_slice(&bytes)
            .map_err(|e| ComponentError::NotEmbedded(format!("[{tag}] bad payload: {e}")))?;

        Ok(Self {
            tag: tag.to_string(),
            id: payload.id,
            sibling: payload.sibling,
        })
    }

    pub fn encode(&self) -> String {
        let payload = NamePayload {
            id: self.id.clone(),
            sibling: self.sibling,
        };
        // Serializing two optional scalars cannot fail.
        let json = serde_json::to_vec(&payload).unwrap_or_else(|_| b"{}".to_vec());
        format!("{PREFIX}{}{SEPARATOR}{}", self.tag, URL_SAFE_NO_PAD.encode(json))
    }
}
