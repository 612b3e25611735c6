//! Push-event payload.

use serde::Deserialize;
use shipwright_core::{Error, Result};

/// The fields of a push event the admission filter reads. Everything else
/// in the payload is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
}

impl PushEvent {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| Error::InvalidPayload(e.to_string()))
    }
}
