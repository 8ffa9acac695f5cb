//! Action responses and their classification

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{HEADER_ACTION_ID, HEADER_MESSAGE, HEADER_RESPONSE, STATUS_ERROR};
use crate::protocol::RawMessage;

/// The server's single reply to one action, correlated by `Actionid`.
///
/// Immutable once constructed; ownership is handed to exactly one waiting
/// caller by the correlator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiResponse {
    action_id: String,
    status: String,
    params: HashMap<String, String>,
}

impl AmiResponse {
    /// Build a response from a raw message, or `None` if the message carries
    /// no `Response` header. All other headers (including `Actionid`) are kept
    /// as params.
    pub(crate) fn classify(message: &RawMessage) -> Option<Self> {
        let status = message
            .get(HEADER_RESPONSE)?
            .clone();
        let action_id = message
            .get(HEADER_ACTION_ID)
            .cloned()
            .unwrap_or_default();

        let params = message
            .iter()
            .filter(|(k, _)| k.as_str() != HEADER_RESPONSE)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(AmiResponse {
            action_id,
            status,
            params,
        })
    }

    /// `Actionid` echoed from the originating action (empty when absent).
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Status string reported by the server (`Success`, `Error`, ...).
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Whether the server reported the action as failed.
    pub fn is_error(&self) -> bool {
        self.status == STATUS_ERROR
    }

    /// Server-provided error text from the `Message` header, if any.
    pub fn message(&self) -> Option<&str> {
        self.params
            .get(HEADER_MESSAGE)
            .map(|s| s.as_str())
    }

    /// Look up a response header by name.
    pub fn param(&self, name: impl AsRef<str>) -> Option<&str> {
        self.params
            .get(name.as_ref())
            .map(|s| s.as_str())
    }

    /// All response headers except `Response` itself.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawMessage {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn classify_requires_response_header() {
        let msg = raw(&[("Event", "PeerStatus"), ("Privilege", "system,all")]);
        assert!(AmiResponse::classify(&msg).is_none());
    }

    #[test]
    fn classify_builds_response() {
        let msg = raw(&[
            ("Response", "Success"),
            ("Actionid", "77"),
            ("Ping", "Pong"),
        ]);
        let resp = AmiResponse::classify(&msg).unwrap();
        assert_eq!(resp.action_id(), "77");
        assert_eq!(resp.status(), "Success");
        assert!(!resp.is_error());
        assert_eq!(resp.param("Ping"), Some("Pong"));
        // Actionid stays in params, Response does not.
        assert_eq!(resp.param("Actionid"), Some("77"));
        assert_eq!(resp.param("Response"), None);
    }

    #[test]
    fn classify_error_response_carries_message() {
        let msg = raw(&[
            ("Response", "Error"),
            ("Actionid", "1"),
            ("Message", "Authentication failed"),
        ]);
        let resp = AmiResponse::classify(&msg).unwrap();
        assert!(resp.is_error());
        assert_eq!(resp.message(), Some("Authentication failed"));
    }

    #[test]
    fn classify_tolerates_missing_action_id() {
        let msg = raw(&[("Response", "Success")]);
        let resp = AmiResponse::classify(&msg).unwrap();
        assert_eq!(resp.action_id(), "");
    }
}
