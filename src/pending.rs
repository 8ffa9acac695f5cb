//! Action/response correlation
//!
//! One single-delivery slot per outstanding action identifier. Registration
//! and removal take the write lock; delivery only needs the read lock, so
//! responses for distinct identifiers land concurrently while each identifier
//! is delivered to exactly once. Removal happens strictly after delivery.

use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::response::AmiResponse;

/// Read-only handle to one action's delivery slot. Yields exactly one
/// [`AmiResponse`], then reports closed.
#[derive(Debug)]
pub struct ResponseHandle {
    action_id: String,
    rx: mpsc::Receiver<AmiResponse>,
}

impl ResponseHandle {
    /// The action identifier this handle is correlated on (auto-generated when
    /// the caller did not supply one).
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Wait for the response. `None` once the single value has been taken, or
    /// when the slot can never be delivered to (duplicate registration, or
    /// session closed before a response arrived).
    ///
    /// The core imposes no timeout: a response that never arrives keeps the
    /// slot allocated until session close. Bound the wait externally with
    /// `tokio::time::timeout` when needed.
    pub async fn recv(&mut self) -> Option<AmiResponse> {
        self.rx
            .recv()
            .await
    }
}

/// Registry of in-flight actions awaiting their response.
#[derive(Debug, Default)]
pub(crate) struct PendingActions {
    slots: RwLock<HashMap<String, mpsc::Sender<AmiResponse>>>,
}

impl PendingActions {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Exclusively register a fresh slot for `action_id` and return its
    /// handle. An existing slot is kept, never replaced: the original caller
    /// retains exclusive delivery and the duplicate handle resolves closed.
    pub(crate) fn register(&self, action_id: &str) -> ResponseHandle {
        let (tx, rx) = mpsc::channel(1);

        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slots.contains_key(action_id) {
            debug!(%action_id, "slot already registered, keeping existing");
            // tx drops here, so the returned handle reports closed.
        } else {
            slots.insert(action_id.to_string(), tx);
        }

        ResponseHandle {
            action_id: action_id.to_string(),
            rx,
        }
    }

    /// Deliver a response to its slot, then remove the identifier.
    ///
    /// Lookup and push run under the shared lock; removal follows under the
    /// exclusive lock. A response with no matching slot (unsolicited or late)
    /// is dropped silently without affecting other slots.
    pub(crate) fn deliver(&self, response: AmiResponse) {
        let action_id = response
            .action_id()
            .to_string();

        {
            let slots = self
                .slots
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match slots.get(&action_id) {
                Some(tx) => {
                    // Capacity 1 and a single delivery per slot: try_send only
                    // fails when the waiting caller dropped its handle.
                    if tx
                        .try_send(response)
                        .is_err()
                    {
                        debug!(%action_id, "caller gone, response discarded");
                    }
                }
                None => {
                    warn!(%action_id, "response without pending action, dropped");
                    return;
                }
            }
        }

        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.remove(&action_id);
    }

    /// Exclusively remove a slot that will never be delivered to (the write
    /// that followed registration failed).
    pub(crate) fn remove(&self, action_id: &str) {
        let mut slots = self
            .slots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.remove(action_id);
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, action_id: &str) -> bool {
        self.slots
            .read()
            .unwrap()
            .contains_key(action_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(id: &str, status: &str) -> AmiResponse {
        let msg: HashMap<String, String> = HashMap::from([
            ("Response".to_string(), status.to_string()),
            ("Actionid".to_string(), id.to_string()),
        ]);
        AmiResponse::classify(&msg).unwrap()
    }

    #[tokio::test]
    async fn delivers_exactly_once_then_removes() {
        let pending = PendingActions::new();
        let mut handle = pending.register("a1");
        assert!(pending.contains("a1"));

        pending.deliver(response("a1", "Success"));

        let resp = handle
            .recv()
            .await
            .unwrap();
        assert_eq!(resp.action_id(), "a1");
        assert!(handle
            .recv()
            .await
            .is_none());
        assert!(!pending.contains("a1"));
    }

    #[tokio::test]
    async fn unsolicited_response_dropped_without_side_effects() {
        let pending = PendingActions::new();
        let mut handle = pending.register("kept");

        pending.deliver(response("nobody-waiting", "Success"));

        assert!(pending.contains("kept"));
        pending.deliver(response("kept", "Success"));
        assert!(handle
            .recv()
            .await
            .is_some());
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_original_slot() {
        let pending = PendingActions::new();
        let mut original = pending.register("dup");
        let mut duplicate = pending.register("dup");

        // The duplicate handle is closed immediately.
        assert!(duplicate
            .recv()
            .await
            .is_none());

        pending.deliver(response("dup", "Success"));
        assert!(original
            .recv()
            .await
            .is_some());
    }

    #[tokio::test]
    async fn concurrent_submissions_never_cross() {
        let pending = std::sync::Arc::new(PendingActions::new());
        let mut h1 = pending.register("id-1");
        let mut h2 = pending.register("id-2");

        let p1 = pending.clone();
        let p2 = pending.clone();
        let d1 = tokio::spawn(async move { p1.deliver(response("id-2", "Error")) });
        let d2 = tokio::spawn(async move { p2.deliver(response("id-1", "Success")) });
        d1.await
            .unwrap();
        d2.await
            .unwrap();

        let r1 = h1
            .recv()
            .await
            .unwrap();
        let r2 = h2
            .recv()
            .await
            .unwrap();
        assert_eq!(r1.action_id(), "id-1");
        assert_eq!(r1.status(), "Success");
        assert_eq!(r2.action_id(), "id-2");
        assert_eq!(r2.status(), "Error");
    }

    #[tokio::test]
    async fn removed_slot_reports_closed() {
        let pending = PendingActions::new();
        let mut handle = pending.register("rollback");
        pending.remove("rollback");
        assert!(handle
            .recv()
            .await
            .is_none());
        assert!(!pending.contains("rollback"));
    }
}
