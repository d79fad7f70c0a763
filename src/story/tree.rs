use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, warn};

use super::node::{StoryNode, is_legacy_linear};

/// A reachable story node wired into the tree.
///
/// Indices refer to positions in the owning [`StoryTree`] arena, which is
/// stored in preorder: the root sits at index 0 and every subtree occupies a
/// contiguous block starting at its own index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub id: String,
    pub sequence_index: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub depth: usize,
    /// Number of nodes in the subtree rooted here, itself included.
    pub subtree_len: usize,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct StoryTree {
    nodes: Vec<TreeNode>,
    index_by_id: HashMap<String, usize>,
    unreachable: Vec<String>,
    linear: bool,
}

impl StoryTree {
    /// Builds the tree for a flat node list. Returns `None` for an empty list
    /// and for lists where every node points at another node (no root).
    pub fn build(source: &[StoryNode]) -> Option<Self> {
        if source.is_empty() {
            return None;
        }

        let mut first_by_id: HashMap<&str, usize> = HashMap::with_capacity(source.len());
        let mut duplicate = vec![false; source.len()];
        for (position, node) in source.iter().enumerate() {
            if first_by_id.contains_key(node.id.as_str()) {
                duplicate[position] = true;
            } else {
                first_by_id.insert(node.id.as_str(), position);
            }
        }

        let linear = is_legacy_linear(source);
        let mut wired_children = vec![Vec::new(); source.len()];

        let root = if linear {
            let chain = (0..source.len())
                .filter(|&position| !duplicate[position])
                .collect::<Vec<_>>();
            for pair in chain.windows(2) {
                wired_children[pair[0]].push(pair[1]);
            }
            chain.first().copied()
        } else {
            let mut root = None;
            for (position, node) in source.iter().enumerate() {
                if duplicate[position] {
                    continue;
                }

                let parent = node
                    .parent_id
                    .as_deref()
                    .and_then(|parent_id| first_by_id.get(parent_id).copied());
                match parent {
                    Some(parent) => wired_children[parent].push(position),
                    None if root.is_none() => root = Some(position),
                    None => {}
                }
            }
            root
        };

        let Some(root) = root else {
            warn!(
                nodes = source.len(),
                "story has parent references but no root candidate; nothing to build"
            );
            return None;
        };

        let mut nodes: Vec<TreeNode> = Vec::with_capacity(source.len());
        let mut index_by_id = HashMap::with_capacity(source.len());
        let mut visited = vec![false; source.len()];
        let mut stack = vec![(root, None::<usize>, 0usize)];

        while let Some((position, parent, depth)) = stack.pop() {
            if visited[position] {
                continue;
            }
            visited[position] = true;

            let index = nodes.len();
            if let Some(parent) = parent {
                nodes[parent].children.push(index);
            }

            let node = &source[position];
            nodes.push(TreeNode {
                id: node.id.clone(),
                sequence_index: node.sequence_index,
                parent,
                children: Vec::new(),
                depth,
                subtree_len: 1,
            });
            index_by_id.insert(node.id.clone(), index);

            for &child in wired_children[position].iter().rev() {
                stack.push((child, Some(index), depth + 1));
            }
        }

        for index in (1..nodes.len()).rev() {
            if let Some(parent) = nodes[index].parent {
                nodes[parent].subtree_len += nodes[index].subtree_len;
            }
        }

        let unreachable = source
            .iter()
            .enumerate()
            .filter(|(position, _)| !visited[*position])
            .map(|(_, node)| node.id.clone())
            .collect::<Vec<_>>();

        if !unreachable.is_empty() {
            warn!(
                count = unreachable.len(),
                ids = ?unreachable,
                "story nodes not reachable from the root"
            );
        }
        debug!(
            nodes = nodes.len(),
            linear,
            root = %nodes[0].id,
            "built story tree"
        );

        Some(Self {
            nodes,
            index_by_id,
            unreachable,
            linear,
        })
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn root_id(&self) -> &str {
        &self.nodes[0].id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// True when the tree was synthesized from a story without parent links.
    pub fn is_linear(&self) -> bool {
        self.linear
    }

    pub fn node(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index_by_id.get(id).copied()
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn children(&self, index: usize) -> &[usize] {
        &self.nodes[index].children
    }

    /// Input ids that the root cannot reach, in sequence order.
    pub fn unreachable(&self) -> &[String] {
        &self.unreachable
    }

    /// Arena indices of the subtree rooted at `index`, the node included.
    pub fn subtree(&self, index: usize) -> Range<usize> {
        index..index + self.nodes[index].subtree_len
    }

    /// Indices ordered so every node comes after all of its descendants.
    pub fn bottom_up(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).rev()
    }

    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|node| node.depth).max().unwrap_or(0)
    }

    /// Nodes grouped by depth; each group keeps preorder (left to right).
    pub fn levels(&self) -> Vec<Vec<usize>> {
        let mut levels = vec![Vec::new(); self.max_depth() + 1];
        for (index, node) in self.nodes.iter().enumerate() {
            levels[node.depth].push(index);
        }
        levels
    }

    /// Arena indices from the root down to `index`.
    pub fn lineage(&self, index: usize) -> Vec<usize> {
        let mut lineage = vec![index];
        let mut cursor = index;
        while let Some(parent) = self.nodes[cursor].parent {
            lineage.push(parent);
            cursor = parent;
        }
        lineage.reverse();
        lineage
    }
}
