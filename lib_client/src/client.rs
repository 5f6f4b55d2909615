//! # Client Facade
//!
//! `OfficeClient` is the single object the 3D and UI layers hold. It wires
//! the transport, connection manager, router, registry, and cached accessors
//! together behind the small surface those layers are allowed to touch:
//! connect/disconnect, room switching, event subscription, and the
//! per-resource cached reads.
//!
//! One instance is meant to be constructed at startup and shared by
//! reference (`Arc`). All call sites share the same connection: any of them
//! calling `disconnect` tears it down for the others too.

use std::sync::Arc;

use tokio::time::Duration;

use crate::config::ClientConfig;
use crate::core::connection::{ConnectionManager, ConnectionState, ConnectionStatus};
use crate::core::registry::{SubscriberRegistry, SubscriptionId};
use crate::core::router::{CanonicalEvent, EventKind};
use crate::model::{
    AgentState, AgentStatusBatch, AgentPositionUpdate, CollaborationNetwork, ManagementHubData,
    NetworkSubscribe, SceneConfig, TaskFlowData, TaskFlowSubscribe, Vec3, TAG_AGENT_POSITION,
    TAG_NETWORK_SUBSCRIBE, TAG_TASK_SUBSCRIBE,
};
use crate::retrieve::cache::TimedCache;
use crate::retrieve::http::ApiClient;
use crate::transport::{TransportCommand, TransportSettings, WsTransport};

/// Realtime state-synchronization client for one OfficeStream backend.
pub struct OfficeClient {
    config: ClientConfig,
    registry: Arc<SubscriberRegistry>,
    manager: ConnectionManager,
    api: ApiClient,
    agents: TimedCache<Vec<AgentState>>,
    task_flows: TimedCache<TaskFlowData>,
    networks: TimedCache<CollaborationNetwork>,
    scenes: TimedCache<SceneConfig>,
    hubs: TimedCache<ManagementHubData>,
}

impl OfficeClient {
    /// Builds a client from the given configuration.
    ///
    /// # Errors
    /// Fails when the configured API base is not a valid URL.
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let registry = Arc::new(SubscriberRegistry::new());
        let manager = ConnectionManager::new(Arc::clone(&registry), config.max_reconnect_attempts);
        let api = ApiClient::new(&config.api_base, config.auth_token.clone())?;
        let ttl = Duration::from_millis(config.cache_ttl_ms);

        Ok(Self {
            config,
            registry,
            manager,
            api,
            agents: TimedCache::new(ttl),
            task_flows: TimedCache::new(ttl),
            networks: TimedCache::new(ttl),
            scenes: TimedCache::new(ttl),
            hubs: TimedCache::new(ttl),
        })
    }

    // ==================== Connection lifecycle ====================

    /// Opens the transport and, once it is up, auto-joins the scene room of
    /// `organization_id` (scene kind from the configuration).
    ///
    /// No-op while a connection is active or an attempt is in flight.
    pub fn connect(&self, organization_id: Option<&str>) {
        if self.manager.state_snapshot().status != ConnectionStatus::Disconnected {
            return;
        }
        let settings = TransportSettings::from_config(&self.config);
        let (commands, events) = WsTransport::spawn(settings);
        if !self
            .manager
            .connect_with(organization_id, &self.config.scene_kind, commands.clone(), events)
        {
            // Lost the idempotency check; stop the spare transport task.
            let _ = commands.send(TransportCommand::Close);
        }
    }

    /// Leaves the active room (if any) and closes the transport. Idempotent.
    pub fn disconnect(&self) {
        self.manager.disconnect();
    }

    /// Switches the active room. Does not leave a previously joined room;
    /// call [`leave_scene`](Self::leave_scene) first for a clean switch.
    pub fn join_scene(&self, organization_id: &str, scene_kind: &str) {
        self.manager.join_scene(organization_id, scene_kind);
    }

    /// Leaves the active room.
    pub fn leave_scene(&self) {
        self.manager.leave_scene();
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Id of the current transport session, if connected.
    pub fn transport_id(&self) -> Option<String> {
        self.manager.transport_id()
    }

    /// A point-in-time copy of the connection state, for diagnostics.
    pub fn connection_state(&self) -> ConnectionState {
        self.manager.state_snapshot()
    }

    // ==================== Event subscription ====================

    /// Registers `callback` for events of `kind`. The returned token removes
    /// exactly this registration via [`off`](Self::off).
    pub fn on<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(CanonicalEvent) + Send + Sync + 'static,
    {
        self.registry.on(kind, callback)
    }

    /// Removes one registration. No-op if the token is unknown.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.registry.off(kind, id)
    }

    // ==================== Outbound scene operations ====================

    /// Broadcasts the local avatar's position to the joined room.
    pub fn update_agent_position(&self, agent_id: &str, position: Vec3, rotation: Option<Vec3>) {
        let Some(organization_id) = self.organization_id() else {
            log::warn!("No room joined, position update not sent");
            return;
        };
        self.manager.send_control(
            TAG_AGENT_POSITION,
            &AgentPositionUpdate {
                agent_id: agent_id.to_string(),
                organization_id,
                position,
                rotation,
            },
        );
    }

    /// Opts in to task-flow push updates for the joined organization.
    pub fn subscribe_task_flow(&self, process_instance_id: Option<&str>) {
        let Some(organization_id) = self.organization_id() else {
            log::warn!("No room joined, task-flow subscription not sent");
            return;
        };
        self.manager.send_control(
            TAG_TASK_SUBSCRIBE,
            &TaskFlowSubscribe {
                organization_id,
                process_instance_id: process_instance_id.map(str::to_string),
            },
        );
    }

    /// Opts in to collaboration-network push updates for the joined
    /// organization.
    pub fn subscribe_collaboration_network(&self) {
        let Some(organization_id) = self.organization_id() else {
            log::warn!("No room joined, network subscription not sent");
            return;
        };
        self.manager
            .send_control(TAG_NETWORK_SUBSCRIBE, &NetworkSubscribe { organization_id });
    }

    // ==================== Cached read accessors ====================

    /// Batch agent states for the joined organization. Returns an empty list
    /// when nothing was ever fetched successfully.
    pub async fn agent_status_batch(&self, agent_ids: Option<&[String]>, force: bool) -> Vec<AgentState> {
        let org = self.organization_id();
        let key = format!(
            "agents:{}:{}",
            org.as_deref().unwrap_or("-"),
            agent_ids.map(|ids| ids.join(",")).unwrap_or_default()
        );

        self.agents
            .get_or_fetch(&key, force, || async {
                let mut body = serde_json::json!({ "includeTasks": true, "includeMetrics": true });
                if let Some(ids) = agent_ids {
                    body["agentIds"] = serde_json::json!(ids);
                }
                if let Some(org) = &org {
                    body["organizationId"] = serde_json::json!(org);
                }
                let batch: AgentStatusBatch = self
                    .api
                    .post("api/metaverse/3d/agents/status/batch", &body)
                    .await?;
                Ok(batch.agents)
            })
            .await
            .unwrap_or_default()
    }

    /// Task-flow graph, optionally narrowed to one process instance.
    pub async fn task_flow(&self, process_instance_id: Option<&str>, force: bool) -> Option<TaskFlowData> {
        let org = self.organization_id();
        let key = format!(
            "task-flow:{}:{}",
            org.as_deref().unwrap_or("-"),
            process_instance_id.unwrap_or("-")
        );

        self.task_flows
            .get_or_fetch(&key, force, || async {
                let mut query: Vec<(&str, String)> = Vec::new();
                if let Some(pid) = process_instance_id {
                    query.push(("processInstanceId", pid.to_string()));
                }
                if let Some(org) = &org {
                    query.push(("organizationId", org.clone()));
                }
                self.api.get("api/metaverse/3d/tasks/flow/stream", &query).await
            })
            .await
    }

    /// Collaboration network over the trailing `time_range_days` window.
    /// Requires an organization (explicit or from the joined room).
    pub async fn collaboration_network(
        &self,
        time_range_days: u32,
        organization_id: Option<&str>,
        force: bool,
    ) -> Option<CollaborationNetwork> {
        let org = organization_id.map(str::to_string).or_else(|| self.organization_id())?;
        let key = format!("network:{}:{}", org, time_range_days);

        self.networks
            .get_or_fetch(&key, force, || async {
                let query = vec![
                    ("organizationId", org.clone()),
                    ("timeRange", time_range_days.to_string()),
                ];
                self.api
                    .get("api/metaverse/3d/collaboration/network/v2", &query)
                    .await
            })
            .await
    }

    /// Static scene configuration for `scene_kind` (defaults to the
    /// configured kind).
    pub async fn scene_config(&self, scene_kind: Option<&str>, force: bool) -> Option<SceneConfig> {
        let kind = scene_kind.unwrap_or(&self.config.scene_kind).to_string();
        let org = self.organization_id();
        let key = format!("scene:{}:{}", kind, org.as_deref().unwrap_or("-"));

        self.scenes
            .get_or_fetch(&key, force, || async {
                let mut query = vec![("sceneType", kind.clone())];
                if let Some(org) = &org {
                    query.push(("organizationId", org.clone()));
                }
                self.api.get("api/metaverse/3d/scene/config", &query).await
            })
            .await
    }

    /// Management-hub dashboard data. Requires an organization (explicit or
    /// from the joined room).
    pub async fn management_hub(
        &self,
        organization_id: Option<&str>,
        force: bool,
    ) -> Option<ManagementHubData> {
        let org = organization_id.map(str::to_string).or_else(|| self.organization_id())?;
        let key = format!("hub:{}", org);

        self.hubs
            .get_or_fetch(&key, force, || async {
                let query = vec![("organizationId", org.clone())];
                self.api.get("api/metaverse/3d/management-hub", &query).await
            })
            .await
    }

    /// Organization of the joined (or pending) room, the default context for
    /// accessors and outbound operations.
    fn organization_id(&self) -> Option<String> {
        self.manager
            .state_snapshot()
            .joined_room
            .map(|room| room.organization_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn room_context_defaults_accessor_organization() {
        let client = OfficeClient::new(ClientConfig::default()).expect("client");
        assert!(client.organization_id().is_none());

        client.join_scene("org-1", "office");
        assert_eq!(client.organization_id().as_deref(), Some("org-1"));

        client.leave_scene();
        assert!(client.organization_id().is_none());
    }

    #[tokio::test]
    async fn outbound_ops_without_a_room_are_dropped_quietly() {
        let client = OfficeClient::new(ClientConfig::default()).expect("client");
        // Not connected and no room joined: these must not panic or block.
        client.update_agent_position("agent-1", Vec3::default(), None);
        client.subscribe_task_flow(None);
        client.subscribe_collaboration_network();
        assert!(!client.is_connected());
    }

    #[test]
    fn invalid_api_base_fails_construction() {
        let mut config = ClientConfig::default();
        config.api_base = "definitely not a url".to_string();
        assert!(OfficeClient::new(config).is_err());
    }
}
