//! # OfficeStream Data Model
//!
//! Wire and domain types exchanged with the OfficeStream backend. The domain
//! structs mirror the JSON shapes the backend publishes (camelCase on the
//! wire); the control-message structs at the bottom are the outbound frames
//! the client emits over the WebSocket.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// Outbound wire tags understood by the backend room handler.
pub const TAG_SCENE_JOIN: &str = "3d:scene:join";
pub const TAG_SCENE_LEAVE: &str = "3d:scene:leave";
pub const TAG_AGENT_POSITION: &str = "3d:agent:position";
pub const TAG_TASK_SUBSCRIBE: &str = "3d:task:subscribe";
pub const TAG_NETWORK_SUBSCRIBE: &str = "3d:network:subscribe";

/// A point or direction in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Operational status of an agent inside the virtual office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Working,
    Idle,
    Meeting,
    Busy,
    #[default]
    Offline,
}

/// A task currently assigned to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedTask {
    pub id: String,
    pub title: String,
    pub status: String,
    pub priority: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Aggregated workload metrics for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetrics {
    pub completed_tasks: u32,
    pub in_progress_tasks: u32,
    pub collaboration_count: u32,
    pub workload_percentage: f64,
    pub availability_score: f64,
    pub last_active_minutes: Option<i64>,
}

/// Live state of a single agent as published by the backend.
///
/// This is the per-entity record carried both by the batch HTTP accessor and
/// by the per-agent status events fanned out of state snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task: Option<AssignedTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tasks: Option<Vec<AssignedTask>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AgentMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<f64>,
    #[serde(default)]
    pub last_update: String,
}

/// One node of the task-flow graph (a task or the agent working it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFlowNode {
    pub id: String,
    pub r#type: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
}

/// A directed edge of the task-flow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub r#type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Completion counters summarizing a task-flow snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFlowStats {
    pub total: u32,
    pub completed: u32,
    pub in_progress: u32,
    pub pending: u32,
    pub delayed: u32,
}

/// The task-flow graph rendered by the pipeline visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFlowData {
    pub nodes: Vec<TaskFlowNode>,
    pub edges: Vec<TaskFlowEdge>,
    pub stats: TaskFlowStats,
}

/// One participant in the collaboration network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkNode {
    pub id: String,
    pub r#type: String,
    pub label: String,
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
}

/// A weighted collaboration link between two agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub collaboration_count: u32,
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
}

/// Topology summary of the collaboration network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_agents: u32,
    pub total_connections: u32,
    pub avg_connections: f64,
    pub isolated_agents: u32,
    pub clusters: u32,
}

/// The collaboration graph rendered by the network visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationNetwork {
    pub nodes: Vec<NetworkNode>,
    pub edges: Vec<NetworkEdge>,
    pub stats: NetworkStats,
}

/// Ambient settings of a 3D scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEnvironment {
    pub skybox: String,
    pub lighting: String,
    pub weather: String,
}

/// Footprint of a room on the scene floor plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SceneRoomBounds {
    pub x: f64,
    pub z: f64,
    pub width: f64,
    pub depth: f64,
}

/// One room of the virtual office.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneRoom {
    pub id: String,
    pub name: String,
    pub r#type: String,
    pub bounds: SceneRoomBounds,
    pub features: Vec<String>,
}

/// A spawn location for avatars entering the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub id: String,
    pub position: Vec3,
    pub rotation: f64,
}

/// A decorative prop placed in the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDecoration {
    pub r#type: String,
    pub position: Vec3,
}

/// Initial placement of one agent within the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneAgentPlacement {
    pub agent_id: String,
    pub name: String,
    pub position: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Static configuration of a 3D scene, fetched once per scene kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneConfig {
    pub name: String,
    pub r#type: String,
    pub environment: SceneEnvironment,
    pub rooms: Vec<SceneRoom>,
    pub spawn_points: Vec<SpawnPoint>,
    pub decorations: Vec<SceneDecoration>,
    pub agent_positions: Vec<SceneAgentPlacement>,
}

/// Business planning panel of the management hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessPlanning {
    pub total_businesses: u32,
    pub businesses: Vec<Value>,
}

/// Process design panel of the management hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDesign {
    pub stats: BTreeMap<String, u32>,
}

/// Pending approvals panel of the management hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStation {
    pub pending_count: u32,
    pub pending_approvals: Vec<Value>,
}

/// Task throughput counters of the management hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubSystemMetrics {
    pub task_stats: BTreeMap<String, u32>,
    pub today_tasks: u32,
    pub completed_today: u32,
    pub efficiency: f64,
}

/// Aggregate dashboard data for the management hub overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementHubData {
    pub business_planning: BusinessPlanning,
    pub process_design: ProcessDesign,
    pub approval_station: ApprovalStation,
    pub system_metrics: HubSystemMetrics,
}

/// Payload of the batch agent-status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatusBatch {
    pub agents: Vec<AgentState>,
}

/// Inbound server frame envelope. Frames whose `type` is not recognized by
/// the router are dropped without error.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEnvelope {
    pub r#type: String,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Room-join control message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneJoin {
    pub organization_id: String,
    pub scene_kind: String,
}

/// Room-leave control message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneLeave {
    pub organization_id: String,
}

/// Avatar position broadcast sent while the local user moves.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPositionUpdate {
    pub agent_id: String,
    pub organization_id: String,
    pub position: Vec3,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
}

/// Opt-in to task-flow push updates for an organization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFlowSubscribe {
    pub organization_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_instance_id: Option<String>,
}

/// Opt-in to collaboration-network push updates for an organization.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSubscribe {
    pub organization_id: String,
}

/// Frames an outbound control message in the `{ "type": ..., "data": ... }`
/// envelope the backend expects.
pub fn control_frame<T: Serialize>(tag: &str, data: &T) -> serde_json::Result<String> {
    let frame = serde_json::json!({ "type": tag, "data": data });
    serde_json::to_string(&frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_state_accepts_partial_records() {
        let raw = serde_json::json!({
            "id": "agent-7",
            "name": "Mia",
            "role": "cto",
            "status": "working",
            "position": { "x": 1.0, "y": 0.0, "z": -2.5 }
        });
        let state: AgentState = serde_json::from_value(raw).expect("partial record");
        assert_eq!(state.status, AgentStatus::Working);
        assert!(state.metrics.is_none());
        assert!(state.rotation.is_none());
    }

    #[test]
    fn control_frame_wraps_tag_and_payload() {
        let join = SceneJoin {
            organization_id: "org-1".into(),
            scene_kind: "office".into(),
        };
        let frame = control_frame(TAG_SCENE_JOIN, &join).expect("serialize");
        let value: Value = serde_json::from_str(&frame).expect("round trip");
        assert_eq!(value["type"], TAG_SCENE_JOIN);
        assert_eq!(value["data"]["organizationId"], "org-1");
        assert_eq!(value["data"]["sceneKind"], "office");
    }

    #[test]
    fn position_update_omits_absent_rotation() {
        let update = AgentPositionUpdate {
            agent_id: "agent-7".into(),
            organization_id: "org-1".into(),
            position: Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            rotation: None,
        };
        let value = serde_json::to_value(&update).expect("serialize");
        assert!(value.get("rotation").is_none());
        assert_eq!(value["agentId"], "agent-7");
    }
}
