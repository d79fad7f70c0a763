use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::story::{StoryNode, is_legacy_linear};

mod choice;

pub use choice::{
    ChoiceMatch, ChoiceOutcome, OptionState, Progress, option_states, progress, resolve_choice,
};

/// How an edge relates to the active path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeState {
    /// The edge leading into the current node.
    Current,
    OnPath,
    Off,
}

/// The root-to-current chain of node ids the reader is viewing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ActivePath {
    ids: Vec<String>,
}

impl ActivePath {
    /// Legacy stories walk every node in order. Branching stories start at
    /// the root and follow the first-listed child until a leaf.
    pub fn initialize(nodes: &[StoryNode]) -> Self {
        if nodes.is_empty() {
            return Self::default();
        }
        if is_legacy_linear(nodes) {
            return Self {
                ids: nodes.iter().map(|node| node.id.clone()).collect(),
            };
        }

        let known = nodes
            .iter()
            .map(|node| node.id.as_str())
            .collect::<HashSet<_>>();
        let Some(root) = nodes.iter().find(|node| {
            node.parent_id
                .as_deref()
                .is_none_or(|parent| !known.contains(parent))
        }) else {
            return Self::default();
        };

        let mut first_child: HashMap<&str, &str> = HashMap::new();
        for node in nodes {
            if let Some(parent) = node.parent_id.as_deref() {
                first_child.entry(parent).or_insert(node.id.as_str());
            }
        }

        let mut ids = vec![root.id.clone()];
        let mut seen = HashSet::from([root.id.as_str()]);
        let mut tail = root.id.as_str();
        while let Some(&child) = first_child.get(tail) {
            if !seen.insert(child) {
                break;
            }
            ids.push(child.to_owned());
            tail = child;
        }

        Self { ids }
    }

    /// Root-first chain ending at `target`, or an empty path when the id is
    /// unknown. Walking stops at a missing parent or a parent cycle.
    pub fn path_to(nodes: &[StoryNode], target: &str) -> Self {
        let by_id = index_nodes(nodes);
        let Some(mut current) = by_id.get(target).copied() else {
            return Self::default();
        };

        let mut ids = vec![current.id.clone()];
        let mut seen = HashSet::from([current.id.as_str()]);
        while let Some(parent) = current
            .parent_id
            .as_deref()
            .and_then(|id| by_id.get(id).copied())
        {
            if !seen.insert(parent.id.as_str()) {
                return Self::default();
            }
            ids.push(parent.id.clone());
            current = parent;
        }

        ids.reverse();
        Self { ids }
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends a node; the caller guarantees it is a child of the tail.
    pub fn extend(&mut self, id: impl Into<String>) {
        self.ids.push(id.into());
    }

    /// Replaces the path with the chain to `target`. Unknown targets leave
    /// the path untouched; returns whether the path changed.
    pub fn jump_to(&mut self, nodes: &[StoryNode], target: &str) -> bool {
        let path = Self::path_to(nodes, target);
        if path.is_empty() {
            return false;
        }
        *self = path;
        true
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn current(&self) -> Option<&str> {
        self.ids.last().map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|entry| entry == id)
    }

    pub fn edge_state(&self, parent: &str, child: &str) -> EdgeState {
        if let [.., before_last, last] = self.ids.as_slice()
            && before_last == parent
            && last == child
        {
            return EdgeState::Current;
        }

        if self.contains(parent) && self.contains(child) {
            EdgeState::OnPath
        } else {
            EdgeState::Off
        }
    }

    /// True when every entry names a node whose parent is the entry before it.
    pub fn is_contiguous(&self, nodes: &[StoryNode]) -> bool {
        let by_id = index_nodes(nodes);
        if self.ids.iter().any(|id| !by_id.contains_key(id.as_str())) {
            return false;
        }
        if is_legacy_linear(nodes) {
            return true;
        }

        self.ids.windows(2).all(|pair| {
            by_id
                .get(pair[1].as_str())
                .and_then(|node| node.parent_id.as_deref())
                == Some(pair[0].as_str())
        })
    }
}

fn index_nodes(nodes: &[StoryNode]) -> HashMap<&str, &StoryNode> {
    let mut by_id = HashMap::with_capacity(nodes.len());
    for node in nodes {
        by_id.entry(node.id.as_str()).or_insert(node);
    }
    by_id
}
