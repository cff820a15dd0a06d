//! Workflow templates: nodes, edges and per-node approval policy.
//!
//! Templates are authored and versioned elsewhere; the engine only reads
//! them. Node configuration is a closed enum so reject handling, permissions
//! and approval counting are matched exhaustively.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::errors::{FlowError, FlowResult};

/// Kind of node, derived from its config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Start,
    Approval,
    Condition,
    End,
}

impl NodeType {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeType::Start => "start",
            NodeType::Approval => "approval",
            NodeType::Condition => "condition",
            NodeType::End => "end",
        }
    }
}

/// What happens when an approver rejects.
///
/// Unknown or empty values read as `Terminate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RejectBehavior {
    #[default]
    Terminate,
    /// Return to the predecessor node.
    Rollback,
    /// Redirect to `reject_target_node`.
    Jump,
}

impl From<String> for RejectBehavior {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "rollback" => RejectBehavior::Rollback,
            "jump" => RejectBehavior::Jump,
            _ => RejectBehavior::Terminate,
        }
    }
}

impl From<RejectBehavior> for String {
    fn from(value: RejectBehavior) -> Self {
        match value {
            RejectBehavior::Terminate => "terminate",
            RejectBehavior::Rollback => "rollback",
            RejectBehavior::Jump => "jump",
        }
        .to_string()
    }
}

/// How many of the listed approvers must approve before the node completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Exactly one approver.
    Single,
    /// Every listed approver.
    #[default]
    Unanimous,
    /// First approve from any listed approver.
    Any,
    /// Listed approvers decide one after another, in list order.
    Sequential,
    /// At least `percent`% of the listed approvers (rounded up, minimum one).
    Proportional { percent: u8 },
}

/// Operations an approval node allows on its approver list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Permissions {
    pub allow_transfer: bool,
    pub allow_add_approver: bool,
    pub allow_remove_approver: bool,
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            allow_transfer: true,
            allow_add_approver: true,
            allow_remove_approver: true,
        }
    }
}

/// Policy of a single approval node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalNodeConfig {
    pub require_comment: bool,
    pub require_attachments: bool,
    pub permissions: Permissions,
    pub reject_behavior: RejectBehavior,
    pub reject_target_node: Option<String>,
    /// Node timeout in milliseconds, measured from submission.
    pub timeout_ms: Option<u64>,
    pub approval_mode: ApprovalMode,
    /// Fixed approvers seeded into every new task.
    pub approvers: Vec<String>,
}

impl ApprovalNodeConfig {
    pub fn with_approvers<I, S>(mut self, approvers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approvers = approvers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = mode;
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_reject(mut self, behavior: RejectBehavior, target: Option<&str>) -> Self {
        self.reject_behavior = behavior;
        self.reject_target_node = target.map(str::to_string);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn requiring_comment(mut self) -> Self {
        self.require_comment = true;
        self
    }

    pub fn requiring_attachments(mut self) -> Self {
        self.require_attachments = true;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Configured jump target, ignoring blank strings.
    pub fn jump_target(&self) -> Option<&str> {
        self.reject_target_node
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
    }
}

/// Node configuration, one variant per node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeConfig {
    Start,
    Approval(ApprovalNodeConfig),
    Condition { expression: serde_json::Value },
    End,
}

impl NodeConfig {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeConfig::Start => NodeType::Start,
            NodeConfig::Approval(_) => NodeType::Approval,
            NodeConfig::Condition { .. } => NodeType::Condition,
            NodeConfig::End => NodeType::End,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub config: NodeConfig,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>, config: NodeConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            config,
        }
    }

    pub fn start(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id, NodeConfig::Start)
    }

    pub fn end(id: impl Into<String>) -> Self {
        let id = id.into();
        Self::new(id.clone(), id, NodeConfig::End)
    }

    pub fn approval(
        id: impl Into<String>,
        name: impl Into<String>,
        config: ApprovalNodeConfig,
    ) -> Self {
        Self::new(id, name, NodeConfig::Approval(config))
    }

    pub fn node_type(&self) -> NodeType {
        self.config.node_type()
    }

    pub fn approval_config(&self) -> Option<&ApprovalNodeConfig> {
        match &self.config {
            NodeConfig::Approval(config) => Some(config),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// A versioned workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub version: u32,
    pub name: String,
    pub nodes: BTreeMap<String, Node>,
    pub edges: Vec<Edge>,
}

impl Template {
    pub fn new(id: impl Into<String>, version: u32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn require_node(&self, node_id: &str) -> FlowResult<&Node> {
        self.node(node_id)
            .ok_or_else(|| FlowError::NodeNotFound(node_id.to_string()))
    }

    /// Looks up an approval node's config.
    ///
    /// # Errors
    /// `NodeNotFound` if the node is missing, `Validation` if it is not an
    /// approval node.
    pub fn approval_config(&self, node_id: &str) -> FlowResult<&ApprovalNodeConfig> {
        let node = self.require_node(node_id)?;
        node.approval_config().ok_or_else(|| {
            FlowError::validation(format!(
                "node '{node_id}' is a {} node, not an approval node",
                node.node_type().as_str()
            ))
        })
    }

    pub fn start_node(&self) -> Option<&Node> {
        self.nodes
            .values()
            .find(|node| node.node_type() == NodeType::Start)
    }

    /// Node a new task starts on: the start node, else the first node by id.
    pub fn entry_node(&self) -> Option<&Node> {
        self.start_node().or_else(|| self.nodes.values().next())
    }

    /// Source of the first edge pointing at `node_id`.
    pub fn predecessor(&self, node_id: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|edge| edge.to == node_id)
            .map(|edge| edge.from.as_str())
    }

    /// Target of the first edge leaving `node_id`.
    pub fn successor(&self, node_id: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|edge| edge.from == node_id)
            .map(|edge| edge.to.as_str())
    }

    pub fn approval_nodes(&self) -> impl Iterator<Item = (&Node, &ApprovalNodeConfig)> {
        self.nodes
            .values()
            .filter_map(|node| node.approval_config().map(|config| (node, config)))
    }
}
