use std::collections::HashMap;

use emath::{Pos2, Rect, pos2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::story::StoryTree;

mod connect;
mod relax;

pub use connect::{Connection, connections};

/// Layout constants. Missing fields in a story's `"layout"` block fall back to
/// the defaults below.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutConfig {
    pub level_height: f32,
    pub node_width: f32,
    /// Minimum gap between adjacent subtree boxes that share a parent.
    pub sibling_gap: f32,
    /// Minimum gap between adjacent subtree boxes with different parents.
    pub subtree_gap: f32,
    pub card_top: f32,
    pub card_bottom: f32,
    pub canvas_padding: f32,
    pub canvas_top_margin: f32,
    pub global_iterations: usize,
    pub level_iterations: usize,
    pub recenter_damping: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            level_height: 200.0,
            node_width: 160.0,
            sibling_gap: 40.0,
            subtree_gap: 40.0,
            card_top: 10.0,
            card_bottom: 75.0,
            canvas_padding: 200.0,
            canvas_top_margin: 50.0,
            global_iterations: 16,
            level_iterations: 30,
            recenter_damping: 0.8,
        }
    }
}

impl LayoutConfig {
    /// Copy with the fixed relationships restored: finite values, a positive
    /// node width, non-negative gaps, `subtree_gap >= sibling_gap` and damping
    /// within `0..=1`.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let finite_or = |value: f32, fallback: f32| {
            if value.is_finite() { value } else { fallback }
        };

        let node_width = finite_or(self.node_width, defaults.node_width);
        let sibling_gap = finite_or(self.sibling_gap, defaults.sibling_gap).max(0.0);
        let subtree_gap = finite_or(self.subtree_gap, defaults.subtree_gap).max(sibling_gap);

        Self {
            level_height: finite_or(self.level_height, defaults.level_height),
            node_width: if node_width > 0.0 {
                node_width
            } else {
                defaults.node_width
            },
            sibling_gap,
            subtree_gap,
            card_top: finite_or(self.card_top, defaults.card_top),
            card_bottom: finite_or(self.card_bottom, defaults.card_bottom),
            canvas_padding: finite_or(self.canvas_padding, defaults.canvas_padding).max(0.0),
            canvas_top_margin: finite_or(self.canvas_top_margin, defaults.canvas_top_margin)
                .max(0.0),
            global_iterations: self.global_iterations,
            level_iterations: self.level_iterations,
            recenter_damping: finite_or(self.recenter_damping, defaults.recenter_damping)
                .clamp(0.0, 1.0),
        }
    }

    /// Center-to-center distance between evenly spread siblings.
    pub fn spacing(&self) -> f32 {
        self.node_width + self.sibling_gap
    }

    pub fn half_width(&self) -> f32 {
        self.node_width / 2.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedNode {
    pub id: String,
    pub position: Pos2,
    pub depth: usize,
    #[serde(skip)]
    subtree_len: usize,
}

/// Positions for every reachable node, in tree preorder.
#[derive(Clone, Debug, Default)]
pub struct TreeLayout {
    nodes: Vec<PlacedNode>,
    index_by_id: HashMap<String, usize>,
    node_width: f32,
}

impl TreeLayout {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[PlacedNode] {
        &self.nodes
    }

    pub fn position(&self, id: &str) -> Option<Pos2> {
        self.index_by_id
            .get(id)
            .map(|&index| self.nodes[index].position)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Pos2)> + '_ {
        self.nodes
            .iter()
            .map(|node| (node.id.as_str(), node.position))
    }

    pub fn to_map(&self) -> HashMap<String, Pos2> {
        self.iter()
            .map(|(id, position)| (id.to_owned(), position))
            .collect()
    }

    /// Drawable area around every node, padded the way the canvas expects.
    pub fn canvas_bounds(&self, config: &LayoutConfig) -> Option<Rect> {
        let first = self.nodes.first()?.position;
        let (mut min_x, mut max_x, mut max_y) = (first.x, first.x, first.y);
        for node in &self.nodes[1..] {
            min_x = min_x.min(node.position.x);
            max_x = max_x.max(node.position.x);
            max_y = max_y.max(node.position.y);
        }

        Some(Rect::from_min_max(
            pos2(min_x - config.canvas_padding, -config.canvas_top_margin),
            pos2(max_x + config.canvas_padding, max_y + config.canvas_padding),
        ))
    }

    /// Smallest gap between adjacent subtree boxes on each depth level;
    /// `None` for levels holding a single node.
    pub fn level_gaps(&self) -> Vec<Option<f32>> {
        let xs = self
            .nodes
            .iter()
            .map(|node| node.position.x)
            .collect::<Vec<_>>();
        let spans = relax::spans_from_preorder(
            &xs,
            self.nodes.iter().map(|node| node.subtree_len),
            self.node_width / 2.0,
        );

        let depth_count = self.nodes.iter().map(|node| node.depth + 1).max().unwrap_or(0);
        let mut levels = vec![Vec::new(); depth_count];
        for (index, node) in self.nodes.iter().enumerate() {
            levels[node.depth].push(spans[index]);
        }

        levels
            .into_iter()
            .map(|mut row| {
                row.sort_by(|a, b| a.center().total_cmp(&b.center()));
                row.windows(2)
                    .map(|pair| pair[1].min - pair[0].max)
                    .min_by(f32::total_cmp)
            })
            .collect()
    }
}

/// Runs the full layout: initial placement, then alternating collision
/// relaxation and parent re-centering. The loop stops before the iteration
/// cap once a global iteration neither shifts a subtree nor moves a parent.
/// No tree yields an empty layout.
pub fn layout_tree(tree: Option<&StoryTree>, config: &LayoutConfig) -> TreeLayout {
    let Some(tree) = tree.filter(|tree| !tree.is_empty()) else {
        return TreeLayout::default();
    };
    let config = config.sanitized();

    let prelim = first_walk(tree);
    let mut xs = second_walk(tree, &prelim, &config);

    let levels = tree.levels();
    let mut total_shifts = 0usize;
    for iteration in 0..config.global_iterations {
        let mut shifts = 0usize;
        for level in &levels {
            shifts += relax::relax_level(tree, &mut xs, level, &config);
        }
        let recentered = relax::recenter_parents(tree, &mut xs, config.recenter_damping);

        total_shifts += shifts;
        if shifts == 0 && recentered == 0 {
            debug!(iterations = iteration + 1, "layout relaxation settled");
            break;
        }
    }

    let nodes = tree
        .nodes()
        .iter()
        .zip(xs)
        .map(|(node, x)| PlacedNode {
            id: node.id.clone(),
            position: pos2(x, node.depth as f32 * config.level_height),
            depth: node.depth,
            subtree_len: node.subtree_len,
        })
        .collect::<Vec<_>>();
    let index_by_id = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id.clone(), index))
        .collect();

    let layout = TreeLayout {
        nodes,
        index_by_id,
        node_width: config.node_width,
    };

    let residual = layout
        .level_gaps()
        .into_iter()
        .flatten()
        .filter(|gap| *gap < config.sibling_gap - 1.0)
        .min_by(f32::total_cmp);
    if let Some(gap) = residual {
        debug!(
            gap,
            required = config.sibling_gap,
            "layout finished with residual overlap; consider raising the iteration caps"
        );
    }
    debug!(nodes = layout.len(), shifts = total_shifts, "laid out story tree");

    layout
}

/// Leaves start at zero; an internal node sits midway between its first and
/// last child.
fn first_walk(tree: &StoryTree) -> Vec<f32> {
    let mut prelim = vec![0.0f32; tree.len()];
    for index in tree.bottom_up() {
        let children = tree.children(index);
        if let (Some(&first), Some(&last)) = (children.first(), children.last()) {
            prelim[index] = (prelim[first] + prelim[last]) / 2.0;
        }
    }
    prelim
}

/// Spreads every sibling group evenly about its parent's final x. The arena
/// is in preorder, so a parent is always placed before its children.
fn second_walk(tree: &StoryTree, prelim: &[f32], config: &LayoutConfig) -> Vec<f32> {
    let spacing = config.spacing();
    let mut xs = vec![0.0f32; tree.len()];
    xs[tree.root()] = prelim[tree.root()];

    for index in 0..tree.len() {
        let children = tree.children(index);
        let start = -((children.len().saturating_sub(1)) as f32 * spacing) / 2.0;
        for (position, &child) in children.iter().enumerate() {
            let offset = start + position as f32 * spacing;
            xs[child] = xs[index] + offset;
        }
    }
    xs
}
