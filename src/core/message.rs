//! Bridge message model.

use serde::{Deserialize, Serialize, Serializer};

/// A message as exchanged with the bridge API.
///
/// Only `text` is mandatory; every other field is whatever the bridge
/// chose to fill in for the originating network.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Message {
    pub text: String,

    #[serde(default, skip_serializing_if = "is_blank", serialize_with = "some_str")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "is_blank", serialize_with = "some_str")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "is_blank", serialize_with = "some_str")]
    pub avatar: Option<String>,

    #[serde(default, skip_serializing_if = "is_blank", serialize_with = "some_str")]
    pub account: Option<String>,

    #[serde(default, skip_serializing_if = "is_blank", serialize_with = "some_str")]
    pub event: Option<String>,

    #[serde(default, skip_serializing_if = "is_blank", serialize_with = "some_str")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "is_blank", serialize_with = "some_str")]
    pub gateway: Option<String>,

    #[serde(default, skip_serializing_if = "is_blank", serialize_with = "some_str")]
    pub timestamp: Option<String>,
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, str::is_empty)
}

// Only reached for non-blank fields, so the value is written bare.
fn some_str<S: Serializer>(field: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(field.as_deref().unwrap_or_default())
}

impl Message {
    /// Create a message with only text set.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Build the response to this message, routed back through the same gateway.
    pub fn reply(&self, text: impl Into<String>) -> Message {
        Message {
            text: text.into(),
            gateway: self.gateway.clone(),
            ..Default::default()
        }
    }
}
