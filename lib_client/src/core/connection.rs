//! # Connection Manager
//!
//! Layers lifecycle semantics on top of the WebSocket transport wrapper:
//! connecting/connected/disconnected status, reconnect bookkeeping, and
//! room-scoped join/leave control messages. The manager reacts to transport
//! open/close/error callbacks; it never runs its own reconnect timer, as that
//! policy belongs to the transport task.
//!
//! The manager is an explicitly constructed object shared by reference.
//! Every call site sees the same [`ConnectionState`]; a `disconnect()` from
//! one site tears the connection down for all of them.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

use crate::core::registry::SubscriberRegistry;
use crate::core::router::{CanonicalEvent, EventKind, Router};
use crate::model::{control_frame, SceneJoin, SceneLeave, TAG_SCENE_JOIN, TAG_SCENE_LEAVE};
use crate::transport::{TransportCommand, TransportEvent};

/// The logical channel the client has asked to join. At most one room is
/// active at a time; reconnection replays the last room automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRef {
    pub organization_id: String,
    pub scene_kind: String,
}

/// Connectivity phase of the single client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Mutable lifecycle state. Exactly one instance exists per client; only the
/// connection manager writes to it.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub transport_id: Option<String>,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
    pub joined_room: Option<RoomRef>,
}

/// Drives the transport wrapper and publishes lifecycle changes as canonical
/// events through the subscriber registry.
pub struct ConnectionManager {
    state: Arc<Mutex<ConnectionState>>,
    registry: Arc<SubscriberRegistry>,
    commands: Mutex<Option<mpsc::UnboundedSender<TransportCommand>>>,
    retry_ceiling: u32,
}

impl ConnectionManager {
    pub fn new(registry: Arc<SubscriberRegistry>, retry_ceiling: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConnectionState::default())),
            registry,
            commands: Mutex::new(None),
            retry_ceiling,
        }
    }

    /// Attaches a transport (its command sender and event receiver) and
    /// starts the event pump.
    ///
    /// No-op returning `false` if a connection is already active or an
    /// attempt is in flight; the status field doubles as the in-flight
    /// guard, so no second transport is ever opened. When `organization_id`
    /// is given it becomes the pending room (with `scene_kind`) joined
    /// automatically once the transport opens; when absent, a room left over
    /// from an earlier session is rejoined instead.
    pub fn connect_with(
        &self,
        organization_id: Option<&str>,
        scene_kind: &str,
        commands: mpsc::UnboundedSender<TransportCommand>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> bool {
        {
            let mut state = self.state.lock().expect("Connection state lock poisoned");
            if state.status != ConnectionStatus::Disconnected {
                log::debug!("connect ignored: connection already {:?}", state.status);
                return false;
            }
            state.status = ConnectionStatus::Connecting;
            state.last_error = None;
            if let Some(org) = organization_id {
                state.joined_room = Some(RoomRef {
                    organization_id: org.to_string(),
                    scene_kind: scene_kind.to_string(),
                });
            }
        }

        *self.commands.lock().expect("Command link lock poisoned") = Some(commands.clone());

        tokio::spawn(pump(
            Arc::clone(&self.state),
            Arc::clone(&self.registry),
            commands,
            events,
            self.retry_ceiling,
        ));
        true
    }

    /// Sends the room-leave message (if a room is active) ahead of the close
    /// command, then drops the transport link. Safe to call repeatedly.
    pub fn disconnect(&self) {
        let room = {
            let mut state = self.state.lock().expect("Connection state lock poisoned");
            let room = state.joined_room.take();
            state.status = ConnectionStatus::Disconnected;
            state.transport_id = None;
            room
        };

        let link = self.commands.lock().expect("Command link lock poisoned").take();
        if let Some(commands) = link {
            if let Some(room) = room {
                let leave = SceneLeave {
                    organization_id: room.organization_id,
                };
                match control_frame(TAG_SCENE_LEAVE, &leave) {
                    // Queued ahead of Close on the same channel, so the
                    // transport sends it before the socket shuts.
                    Ok(frame) => {
                        let _ = commands.send(TransportCommand::Send(frame));
                    }
                    Err(e) => log::error!("Failed to encode scene leave: {}", e),
                }
            }
            let _ = commands.send(TransportCommand::Close);
        }
    }

    /// Switches the active room. Joining while another room is active does
    /// not leave the old one; callers that need a clean switch must call
    /// [`leave_scene`](Self::leave_scene) first.
    pub fn join_scene(&self, organization_id: &str, scene_kind: &str) {
        let room = RoomRef {
            organization_id: organization_id.to_string(),
            scene_kind: scene_kind.to_string(),
        };
        let connected = {
            let mut state = self.state.lock().expect("Connection state lock poisoned");
            state.joined_room = Some(room.clone());
            state.status == ConnectionStatus::Connected
        };
        if connected {
            self.send_control(
                TAG_SCENE_JOIN,
                &SceneJoin {
                    organization_id: room.organization_id,
                    scene_kind: room.scene_kind,
                },
            );
        }
    }

    /// Leaves the active room (clearing it) and tells the backend when the
    /// transport is up.
    pub fn leave_scene(&self) {
        let (room, connected) = {
            let mut state = self.state.lock().expect("Connection state lock poisoned");
            (state.joined_room.take(), state.status == ConnectionStatus::Connected)
        };
        if let Some(room) = room {
            if connected {
                self.send_control(
                    TAG_SCENE_LEAVE,
                    &SceneLeave {
                        organization_id: room.organization_id,
                    },
                );
            }
        }
    }

    /// Frames and sends a control message when connected; otherwise the
    /// message is dropped with a warning, matching the fire-and-forget
    /// contract of the push channel.
    pub fn send_control<T: Serialize>(&self, tag: &str, data: &T) {
        if !self.is_connected() {
            log::warn!("Not connected, '{}' message not sent", tag);
            return;
        }
        let frame = match control_frame(tag, data) {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode '{}' message: {}", tag, e);
                return;
            }
        };
        let link = self.commands.lock().expect("Command link lock poisoned");
        match link.as_ref() {
            Some(commands) => {
                if commands.send(TransportCommand::Send(frame)).is_err() {
                    log::warn!("Transport task gone, '{}' message not sent", tag);
                }
            }
            None => log::warn!("Not connected, '{}' message not sent", tag),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().expect("Connection state lock poisoned").status
            == ConnectionStatus::Connected
    }

    /// Current transport session id, if connected.
    pub fn transport_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("Connection state lock poisoned")
            .transport_id
            .clone()
    }

    /// A point-in-time copy of the connection state.
    pub fn state_snapshot(&self) -> ConnectionState {
        self.state.lock().expect("Connection state lock poisoned").clone()
    }
}

/// Translates transport events into state mutations and canonical events.
/// Runs until the transport's event channel closes.
async fn pump(
    state: Arc<Mutex<ConnectionState>>,
    registry: Arc<SubscriberRegistry>,
    commands: mpsc::UnboundedSender<TransportCommand>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    retry_ceiling: u32,
) {
    let router = Router;

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Opened { transport_id } => {
                let room = {
                    let mut state = state.lock().expect("Connection state lock poisoned");
                    state.status = ConnectionStatus::Connected;
                    state.transport_id = Some(transport_id.clone());
                    state.reconnect_attempts = 0;
                    state.last_error = None;
                    state.joined_room.clone()
                };

                // Auto-join: pending room from this connect call, or the
                // room held over a reconnect.
                if let Some(room) = room {
                    let join = SceneJoin {
                        organization_id: room.organization_id,
                        scene_kind: room.scene_kind,
                    };
                    match control_frame(TAG_SCENE_JOIN, &join) {
                        Ok(frame) => {
                            if commands.send(TransportCommand::Send(frame)).is_err() {
                                log::warn!("Transport task gone before scene join was sent");
                            }
                        }
                        Err(e) => log::error!("Failed to encode scene join: {}", e),
                    }
                }

                registry.dispatch(CanonicalEvent::new(
                    EventKind::ConnectionStatus,
                    json!({ "connected": true, "transportId": transport_id }),
                ));
            }
            TransportEvent::Closed { reason } => {
                {
                    let mut state = state.lock().expect("Connection state lock poisoned");
                    state.status = ConnectionStatus::Disconnected;
                    state.transport_id = None;
                    state.last_error = Some(reason.clone());
                    // joined_room is kept so a reconnect can rejoin.
                }
                registry.dispatch(CanonicalEvent::new(
                    EventKind::ConnectionStatus,
                    json!({ "connected": false, "reason": reason }),
                ));
            }
            TransportEvent::Errored { error } => {
                let attempts = {
                    let mut state = state.lock().expect("Connection state lock poisoned");
                    state.reconnect_attempts += 1;
                    state.last_error = Some(error.clone());
                    state.reconnect_attempts
                };
                // Surfaced once the transport's retry budget is spent; the
                // counter only resets on a successful open.
                if attempts >= retry_ceiling {
                    registry.dispatch(CanonicalEvent::new(
                        EventKind::Error,
                        json!({ "type": "connection", "error": error }),
                    ));
                }
            }
            TransportEvent::Frame(text) => {
                for event in router.route(&text) {
                    registry.dispatch(event);
                }
            }
        }
    }

    log::debug!("Connection event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Harness {
        manager: ConnectionManager,
        registry: Arc<SubscriberRegistry>,
        cmd_rx: mpsc::UnboundedReceiver<TransportCommand>,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    }

    /// Wires a manager to hand-made channels standing in for the transport.
    fn connect(organization_id: Option<&str>) -> Harness {
        let registry = Arc::new(SubscriberRegistry::new());
        let manager = ConnectionManager::new(Arc::clone(&registry), 5);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        assert!(manager.connect_with(organization_id, "office", cmd_tx, event_rx));
        Harness {
            manager,
            registry,
            cmd_rx,
            event_tx,
        }
    }

    fn capture(registry: &SubscriberRegistry, kind: EventKind) -> Arc<Mutex<Vec<Value>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry.on(kind, move |event| {
            sink.lock().unwrap().push(event.payload);
        });
        seen
    }

    async fn next_command(rx: &mut mpsc::UnboundedReceiver<TransportCommand>) -> TransportCommand {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for command")
            .expect("command channel closed")
    }

    fn sent_frame(cmd: TransportCommand) -> Value {
        match cmd {
            TransportCommand::Send(text) => serde_json::from_str(&text).expect("frame is JSON"),
            other => panic!("expected Send, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn open_joins_room_once_and_reports_connected() {
        let mut h = connect(Some("org-1"));
        let statuses = capture(&h.registry, EventKind::ConnectionStatus);

        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();

        let join = sent_frame(next_command(&mut h.cmd_rx).await);
        assert_eq!(join["type"], TAG_SCENE_JOIN);
        assert_eq!(join["data"]["organizationId"], "org-1");
        assert_eq!(join["data"]["sceneKind"], "office");

        // No second join, and exactly one connected event.
        assert!(timeout(Duration::from_millis(50), h.cmd_rx.recv()).await.is_err());
        let statuses = statuses.lock().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0]["connected"], true);
        assert_eq!(statuses[0]["transportId"], "t-1");
        assert!(h.manager.is_connected());
        assert_eq!(h.manager.transport_id().as_deref(), Some("t-1"));
    }

    #[tokio::test]
    async fn second_connect_is_a_no_op() {
        let h = connect(Some("org-1"));
        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();
        tokio::task::yield_now().await;

        let (other_cmd_tx, _other_cmd_rx) = mpsc::unbounded_channel();
        let (_other_event_tx, other_event_rx) = mpsc::unbounded_channel();
        assert!(!h.manager.connect_with(Some("org-2"), "office", other_cmd_tx, other_event_rx));

        // The original room assignment is untouched.
        let state = h.manager.state_snapshot();
        assert_eq!(state.joined_room.as_ref().unwrap().organization_id, "org-1");
    }

    #[tokio::test]
    async fn disconnect_leaves_room_before_close() {
        let mut h = connect(Some("org-1"));
        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();
        let _join = next_command(&mut h.cmd_rx).await;

        h.manager.disconnect();

        let leave = sent_frame(next_command(&mut h.cmd_rx).await);
        assert_eq!(leave["type"], TAG_SCENE_LEAVE);
        assert_eq!(leave["data"]["organizationId"], "org-1");
        assert!(matches!(next_command(&mut h.cmd_rx).await, TransportCommand::Close));

        assert!(!h.manager.is_connected());
        assert!(h.manager.state_snapshot().joined_room.is_none());

        // Idempotent: a second disconnect sends nothing further.
        h.manager.disconnect();
        assert!(timeout(Duration::from_millis(50), h.cmd_rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn reconnect_replays_the_last_room() {
        let mut h = connect(Some("org-1"));
        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();
        let _join = next_command(&mut h.cmd_rx).await;

        h.event_tx
            .send(TransportEvent::Closed { reason: "stream ended".into() })
            .unwrap();
        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-2".into() })
            .unwrap();

        let rejoin = sent_frame(next_command(&mut h.cmd_rx).await);
        assert_eq!(rejoin["type"], TAG_SCENE_JOIN);
        assert_eq!(rejoin["data"]["organizationId"], "org-1");
        assert_eq!(h.manager.transport_id().as_deref(), Some("t-2"));
    }

    #[tokio::test]
    async fn unexpected_close_keeps_room_and_reports_disconnected() {
        let mut h = connect(Some("org-1"));
        let statuses = capture(&h.registry, EventKind::ConnectionStatus);

        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();
        let _join = next_command(&mut h.cmd_rx).await;
        h.event_tx
            .send(TransportEvent::Closed { reason: "read error: reset".into() })
            .unwrap();
        tokio::task::yield_now().await;

        assert!(!h.manager.is_connected());
        let state = h.manager.state_snapshot();
        assert!(state.joined_room.is_some());
        assert_eq!(state.last_error.as_deref(), Some("read error: reset"));

        let statuses = statuses.lock().unwrap();
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[1]["connected"], false);
        assert_eq!(statuses[1]["reason"], "read error: reset");
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_surfaces_one_error_event() {
        let h = connect(Some("org-1"));
        let errors = capture(&h.registry, EventKind::Error);

        for n in 1..=5 {
            h.event_tx
                .send(TransportEvent::Errored { error: format!("refused #{}", n) })
                .unwrap();
        }
        tokio::task::yield_now().await;

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["type"], "connection");
        assert_eq!(h.manager.state_snapshot().reconnect_attempts, 5);
    }

    #[tokio::test]
    async fn successful_open_resets_the_retry_counter() {
        let h = connect(Some("org-1"));
        for n in 1..=3 {
            h.event_tx
                .send(TransportEvent::Errored { error: format!("refused #{}", n) })
                .unwrap();
        }
        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();
        tokio::task::yield_now().await;

        assert_eq!(h.manager.state_snapshot().reconnect_attempts, 0);
    }

    #[tokio::test]
    async fn inbound_frames_reach_subscribers_via_the_router() {
        let h = connect(Some("org-1"));
        let updates = capture(&h.registry, EventKind::StatusUpdate);

        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();
        let frame = serde_json::json!({
            "type": "data_update",
            "data": { "agentStates": [ { "id": "a-1" }, { "id": "a-2" } ] }
        });
        h.event_tx.send(TransportEvent::Frame(frame.to_string())).unwrap();
        tokio::task::yield_now().await;

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0]["id"], "a-1");
        assert_eq!(updates[1]["id"], "a-2");
    }

    #[tokio::test]
    async fn join_scene_does_not_auto_leave_the_previous_room() {
        let mut h = connect(Some("org-1"));
        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();
        let _join = next_command(&mut h.cmd_rx).await;

        h.manager.join_scene("org-2", "warehouse");

        // Only a join for the new room goes out; leaving org-1 is the
        // caller's responsibility.
        let join = sent_frame(next_command(&mut h.cmd_rx).await);
        assert_eq!(join["type"], TAG_SCENE_JOIN);
        assert_eq!(join["data"]["organizationId"], "org-2");
        assert_eq!(join["data"]["sceneKind"], "warehouse");
        assert!(timeout(Duration::from_millis(50), h.cmd_rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn leave_scene_clears_the_room() {
        let mut h = connect(Some("org-1"));
        h.event_tx
            .send(TransportEvent::Opened { transport_id: "t-1".into() })
            .unwrap();
        let _join = next_command(&mut h.cmd_rx).await;

        h.manager.leave_scene();

        let leave = sent_frame(next_command(&mut h.cmd_rx).await);
        assert_eq!(leave["type"], TAG_SCENE_LEAVE);
        assert!(h.manager.state_snapshot().joined_room.is_none());
    }
}
