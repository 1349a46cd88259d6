//! Objects of the headline feed and the image transform service.
//!
//! The feed answers `GET` with a JSON array of headline strings. The
//! transform service takes a [`TransformRequest`] and answers with the raw
//! image bytes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRequest {
    pub prompt: String,
}
