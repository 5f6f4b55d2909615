//! # Message Router / Normalizer
//!
//! Rewrites raw server frames into the canonical event taxonomy dispatched to
//! subscribers. Two wire families are supported concurrently: the legacy
//! enveloped messages (full-state snapshots, task lifecycle messages) and the
//! current `3d:*` events, which already match canonical kinds and pass
//! through unchanged. Frames with an unrecognized `type` are dropped without
//! error so that newer backends never crash older clients.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::WireEnvelope;

/// Closed taxonomy of events the client publishes to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Per-agent status/position change.
    StatusUpdate,
    /// Task-flow graph change.
    TaskFlowUpdate,
    /// Collaboration-network change.
    NetworkUpdate,
    /// Meeting lifecycle change.
    MeetingUpdate,
    /// Pipeline animation event.
    PipelineEvent,
    /// A task is blocked on a human decision.
    InterventionRequired,
    /// Transport connectivity change.
    ConnectionStatus,
    /// Client-level error (e.g. retry budget exhausted).
    Error,
}

/// The normalized unit dispatched to subscribers, independent of wire format.
#[derive(Debug, Clone)]
pub struct CanonicalEvent {
    pub kind: EventKind,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl CanonicalEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Translates one decoded inbound frame into zero or more canonical events.
///
/// The router performs no caching and no filtering by subscriber interest;
/// fan-out to callbacks is the registry's job.
pub struct Router;

impl Router {
    /// Decodes and routes a raw text frame. Malformed JSON and frames without
    /// a usable envelope are dropped with a debug log.
    pub fn route(&self, frame: &str) -> Vec<CanonicalEvent> {
        match serde_json::from_str::<WireEnvelope>(frame) {
            Ok(envelope) => self.route_envelope(envelope),
            Err(e) => {
                log::debug!("Dropping malformed frame: {}", e);
                Vec::new()
            }
        }
    }

    /// Applies the translation rule selected by the envelope's `type` tag.
    pub fn route_envelope(&self, envelope: WireEnvelope) -> Vec<CanonicalEvent> {
        let data = envelope.data.unwrap_or(Value::Null);

        match envelope.r#type.as_str() {
            // Legacy enveloped family -------------------------------------
            //
            // Full-state snapshot: fanned out into one status event per
            // agent record so subscribers can keep filtering by agent id.
            "data_update" => match data.get("agentStates").and_then(Value::as_array) {
                Some(records) => records
                    .iter()
                    .map(|record| CanonicalEvent::new(EventKind::StatusUpdate, record.clone()))
                    .collect(),
                None => {
                    log::debug!("Dropping data_update frame without agentStates array");
                    Vec::new()
                }
            },
            "task_created" | "task_assigned" | "task_updated" => {
                vec![CanonicalEvent::new(EventKind::TaskFlowUpdate, data)]
            }
            "intervention_required" => {
                log::warn!("Intervention required: {}", data);
                vec![CanonicalEvent::new(EventKind::InterventionRequired, data)]
            }

            // Current direct family ---------------------------------------
            "3d:agent:status" | "3d:agent:position:update" => {
                vec![CanonicalEvent::new(EventKind::StatusUpdate, data)]
            }
            "3d:task:flow:update" => {
                vec![CanonicalEvent::new(EventKind::TaskFlowUpdate, data)]
            }
            "3d:network:update" => {
                vec![CanonicalEvent::new(EventKind::NetworkUpdate, data)]
            }
            "3d:meeting:update" => {
                vec![CanonicalEvent::new(EventKind::MeetingUpdate, data)]
            }
            "3d:pipeline:event" => {
                vec![CanonicalEvent::new(EventKind::PipelineEvent, data)]
            }

            // Acknowledgements worth a log line, but no subscriber event.
            "room:joined" | "3d:scene:connected" => {
                log::info!("Scene acknowledgement '{}': {}", envelope.r#type, data);
                Vec::new()
            }
            "pong" => Vec::new(),

            // Unknown tags: deliberately ignored for forward compatibility.
            other => {
                log::trace!("Ignoring unrecognized message type '{}'", other);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snapshot_fans_out_one_event_per_agent_record() {
        let router = Router;
        let frame = json!({
            "type": "data_update",
            "data": {
                "agentStates": [
                    { "id": "agent-1", "status": "working" },
                    { "id": "agent-2", "status": "idle" },
                    { "id": "agent-3", "status": "meeting" }
                ]
            }
        });

        let events = router.route(&frame.to_string());
        assert_eq!(events.len(), 3);
        for (event, expected_id) in events.iter().zip(["agent-1", "agent-2", "agent-3"]) {
            assert_eq!(event.kind, EventKind::StatusUpdate);
            assert_eq!(event.payload["id"], expected_id);
        }
    }

    #[test]
    fn task_messages_map_one_to_one() {
        let router = Router;
        for tag in ["task_created", "task_assigned", "task_updated"] {
            let frame = json!({ "type": tag, "data": { "taskId": "t-9" } });
            let events = router.route(&frame.to_string());
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].kind, EventKind::TaskFlowUpdate);
            assert_eq!(events[0].payload["taskId"], "t-9");
        }
    }

    #[test]
    fn direct_family_passes_through_unchanged() {
        let router = Router;
        let cases = [
            ("3d:agent:status", EventKind::StatusUpdate),
            ("3d:agent:position:update", EventKind::StatusUpdate),
            ("3d:task:flow:update", EventKind::TaskFlowUpdate),
            ("3d:network:update", EventKind::NetworkUpdate),
            ("3d:meeting:update", EventKind::MeetingUpdate),
            ("3d:pipeline:event", EventKind::PipelineEvent),
        ];

        for (tag, kind) in cases {
            let frame = json!({ "type": tag, "data": { "k": "v" } });
            let events = router.route(&frame.to_string());
            assert_eq!(events.len(), 1, "tag {}", tag);
            assert_eq!(events[0].kind, kind, "tag {}", tag);
            assert_eq!(events[0].payload, json!({ "k": "v" }));
        }
    }

    #[test]
    fn intervention_is_surfaced_as_canonical_event() {
        let router = Router;
        let frame = json!({
            "type": "intervention_required",
            "data": { "requestId": "intervention-001", "title": "Budget sign-off" }
        });

        let events = router.route(&frame.to_string());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::InterventionRequired);
        assert_eq!(events[0].payload["requestId"], "intervention-001");
    }

    #[test]
    fn unknown_and_housekeeping_tags_produce_nothing() {
        let router = Router;
        for tag in ["pong", "room:joined", "3d:scene:connected", "3d:some:future:event"] {
            let frame = json!({ "type": tag, "data": {} });
            assert!(router.route(&frame.to_string()).is_empty(), "tag {}", tag);
        }
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let router = Router;
        assert!(router.route("not json at all").is_empty());
        assert!(router.route("{\"data\": {}}").is_empty()); // missing type tag
        let snapshot_without_array = json!({ "type": "data_update", "data": { "agentStates": 7 } });
        assert!(router.route(&snapshot_without_array.to_string()).is_empty());
    }
}
