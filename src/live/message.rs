use serde::Serialize;

/// Server → client message.
///
/// Wire format: `{"type":"reload"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    Reload,
}

impl LiveMessage {
    pub fn to_json(self) -> String {
        serde_json::to_string(&self).unwrap_or_else(|_| r#"{"type":"reload"}"#.into())
    }
}
