use crate::state::entry::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Scheme reported for agents that have none configured.
pub const DEFAULT_SCHEME: &str = "Scheme 1";

/// One agent in the sales hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentNode {
    pub id: AgentId,
    pub parent: Option<AgentId>,
    #[serde(default)]
    pub scheme: Option<String>,
}

impl AgentNode {
    pub fn new(id: &str, parent: Option<&str>, scheme: Option<&str>) -> Self {
        AgentNode {
            id: id.to_string(),
            parent: parent.map(str::to_string),
            scheme: scheme.map(str::to_string),
        }
    }
}

/// Adjacency view of the agent hierarchy.
#[derive(Debug, Clone, Default)]
pub struct AgentTree {
    children: HashMap<AgentId, Vec<AgentId>>,
    schemes: HashMap<AgentId, String>,
}

impl AgentTree {
    pub fn build(nodes: &[AgentNode]) -> Self {
        let mut tree = AgentTree::default();
        for node in nodes {
            if let Some(scheme) = &node.scheme {
                tree.schemes.insert(node.id.clone(), scheme.clone());
            }
            if let Some(parent) = &node.parent {
                tree.children
                    .entry(parent.clone())
                    .or_default()
                    .push(node.id.clone());
            }
        }
        tree
    }

    /// Every agent reachable below `root`, excluding `root` itself.
    ///
    /// Iterative depth-first walk; the visited set keeps a misconfigured cycle
    /// from looping.
    pub fn descendants(&self, root: &str) -> Vec<AgentId> {
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(root);
        let mut out = Vec::new();
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            let Some(children) = self.children.get(current) else {
                continue;
            };
            for child in children {
                if visited.insert(child.as_str()) {
                    out.push(child.clone());
                    stack.push(child.as_str());
                }
            }
        }
        out
    }

    /// `root` followed by all of its descendants.
    pub fn subtree(&self, root: &str) -> Vec<AgentId> {
        let mut agents = vec![root.to_string()];
        agents.extend(self.descendants(root));
        agents
    }

    pub fn scheme(&self, agent: &str) -> &str {
        self.schemes
            .get(agent)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SCHEME)
    }
}
