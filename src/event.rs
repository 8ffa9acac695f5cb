//! Unsolicited events and the event-descriptor registry

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::constants::{HEADER_EVENT, HEADER_PRIVILEGE};
use crate::protocol::RawMessage;

/// Unsolicited server notification, identified by an `Event` name and a
/// privilege scope list. Never mutated after creation; a single logical
/// stream delivers events to the subscriber in wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiEvent {
    id: String,
    privilege: Vec<String>,
    params: HashMap<String, String>,
}

impl AmiEvent {
    /// Build an event from a raw message, or `None` if the message carries no
    /// `Event` header. `Privilege` is split on commas; every other header
    /// becomes a param.
    ///
    /// The `Event` and `Response` checks are evaluated independently by the
    /// dispatcher; this constructor makes no exclusivity assumption about the
    /// message.
    pub(crate) fn classify(message: &RawMessage) -> Option<Self> {
        let id = message
            .get(HEADER_EVENT)?
            .clone();
        let privilege = message
            .get(HEADER_PRIVILEGE)
            .map(|p| {
                p.split(',')
                    .map(|s| s.trim().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let params = message
            .iter()
            .filter(|(k, _)| k.as_str() != HEADER_EVENT && k.as_str() != HEADER_PRIVILEGE)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Some(AmiEvent {
            id,
            privilege,
            params,
        })
    }

    /// Event identifier (the `Event` header value, e.g. `PeerStatus`).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Privilege scopes this event was emitted under.
    pub fn privilege(&self) -> &[String] {
        &self.privilege
    }

    /// Look up an event header by name.
    pub fn param(&self, name: impl AsRef<str>) -> Option<&str> {
        self.params
            .get(name.as_ref())
            .map(|s| s.as_str())
    }

    /// All event headers except `Event` and `Privilege`.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }
}

/// One named field of a known event kind: a logical name and the AMI header
/// it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Logical field name.
    pub name: &'static str,
    /// AMI header (canonicalized form) carrying the field.
    pub header: &'static str,
}

/// Schema for one known event kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    /// Event identifier this descriptor applies to.
    pub id: &'static str,
    /// Known fields of the event.
    pub fields: &'static [FieldDescriptor],
}

/// Fields of the `PeerStatus` event (peer registration state changes).
pub const PEER_STATUS_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "channel_type",
        header: "Channeltype",
    },
    FieldDescriptor {
        name: "peer",
        header: "Peer",
    },
    FieldDescriptor {
        name: "peer_status",
        header: "Peerstatus",
    },
];

/// Explicit, constructed-at-startup mapping from event identifier to its
/// descriptor.
///
/// The session core never depends on the registry's contents; it only hands
/// the raw identifier and header map across this boundary. Callers register
/// the event kinds they care about, no load-time side effects involved.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    descriptors: HashMap<&'static str, EventDescriptor>,
}

impl EventRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in descriptors (`PeerStatus`).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(EventDescriptor {
            id: "PeerStatus",
            fields: PEER_STATUS_FIELDS,
        });
        registry
    }

    /// Register a descriptor, replacing any previous one for the same id.
    pub fn register(&mut self, descriptor: EventDescriptor) {
        self.descriptors
            .insert(descriptor.id, descriptor);
    }

    /// Descriptor for an event identifier, if known.
    pub fn lookup(&self, id: &str) -> Option<&EventDescriptor> {
        self.descriptors
            .get(id)
    }

    /// Extract the described fields from an event: `(name, value)` pairs for
    /// every descriptor field present in the event's params. `None` when the
    /// event's kind is not registered.
    pub fn describe<'a>(&self, event: &'a AmiEvent) -> Option<Vec<(&'static str, &'a str)>> {
        let descriptor = self.lookup(event.id())?;
        Some(
            descriptor
                .fields
                .iter()
                .filter_map(|f| {
                    event
                        .param(f.header)
                        .map(|v| (f.name, v))
                })
                .collect(),
        )
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
    fn classify_requires_event_header() {
        let msg = raw(&[("Response", "Success"), ("Actionid", "1")]);
        assert!(AmiEvent::classify(&msg).is_none());
    }

    #[test]
    fn classify_splits_privilege_and_keeps_params() {
        let msg = raw(&[
            ("Event", "PeerStatus"),
            ("Privilege", "system,all"),
            ("Peer", "SIP/2001"),
            ("Peerstatus", "Registered"),
        ]);
        let event = AmiEvent::classify(&msg).unwrap();
        assert_eq!(event.id(), "PeerStatus");
        assert_eq!(event.privilege(), ["system", "all"]);
        assert_eq!(event.param("Peer"), Some("SIP/2001"));
        assert_eq!(event.param("Event"), None);
        assert_eq!(event.param("Privilege"), None);
    }

    #[test]
    fn classify_without_privilege_header() {
        let msg = raw(&[("Event", "FullyBooted")]);
        let event = AmiEvent::classify(&msg).unwrap();
        assert!(event
            .privilege()
            .is_empty());
    }

    #[test]
    fn registry_lookup_and_describe() {
        let registry = EventRegistry::with_builtin();
        assert!(registry
            .lookup("PeerStatus")
            .is_some());
        assert!(registry
            .lookup("Newchannel")
            .is_none());

        let msg = raw(&[
            ("Event", "PeerStatus"),
            ("Privilege", "system,all"),
            ("Channeltype", "SIP"),
            ("Peer", "SIP/2001"),
            ("Peerstatus", "Reachable"),
        ]);
        let event = AmiEvent::classify(&msg).unwrap();
        let fields = registry
            .describe(&event)
            .unwrap();
        assert!(fields.contains(&("channel_type", "SIP")));
        assert!(fields.contains(&("peer", "SIP/2001")));
        assert!(fields.contains(&("peer_status", "Reachable")));
    }

    #[test]
    fn registry_is_explicitly_extensible() {
        const HANGUP_FIELDS: &[FieldDescriptor] = &[
            FieldDescriptor {
                name: "channel",
                header: "Channel",
            },
            FieldDescriptor {
                name: "cause",
                header: "Cause",
            },
        ];

        let mut registry = EventRegistry::new();
        assert!(registry
            .lookup("Hangup")
            .is_none());
        registry.register(EventDescriptor {
            id: "Hangup",
            fields: HANGUP_FIELDS,
        });
        assert!(registry
            .lookup("Hangup")
            .is_some());

        let msg = raw(&[
            ("Event", "Hangup"),
            ("Channel", "SIP/2001-0001"),
            ("Cause", "16"),
        ]);
        let event = AmiEvent::classify(&msg).unwrap();
        let fields = registry
            .describe(&event)
            .unwrap();
        assert_eq!(fields, vec![("channel", "SIP/2001-0001"), ("cause", "16")]);
    }

    #[test]
    fn event_round_trips_through_serde() {
        let msg = raw(&[
            ("Event", "PeerStatus"),
            ("Privilege", "system,all"),
            ("Peer", "SIP/2001"),
        ]);
        let event = AmiEvent::classify(&msg).unwrap();
        let json = serde_json::to_string(&event).unwrap();
        let back: AmiEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn describe_unknown_event_is_none() {
        let registry = EventRegistry::with_builtin();
        let msg = raw(&[("Event", "Newexten")]);
        let event = AmiEvent::classify(&msg).unwrap();
        assert!(registry
            .describe(&event)
            .is_none());
    }
}
