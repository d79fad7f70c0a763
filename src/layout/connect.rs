use emath::{Pos2, pos2};
use serde::Serialize;

use super::{LayoutConfig, TreeLayout};
use crate::story::StoryTree;

/// A parent to child edge with its drawing geometry.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub parent_id: String,
    pub child_id: String,
    /// 1-based position among the parent's children.
    pub branch_number: usize,
    pub from: Pos2,
    pub to: Pos2,
    pub badge: Pos2,
    /// Control points of the cubic curve from `from` to `to`.
    pub controls: [Pos2; 2],
}

/// One connection per tree edge, in preorder. Edges touching a node missing
/// from `layout` are skipped.
pub fn connections(
    tree: &StoryTree,
    layout: &TreeLayout,
    config: &LayoutConfig,
) -> Vec<Connection> {
    let mut out = Vec::with_capacity(tree.len().saturating_sub(1));

    for parent in tree.nodes() {
        let Some(parent_pos) = layout.position(&parent.id) else {
            continue;
        };

        for (branch, &child_index) in parent.children.iter().enumerate() {
            let child = tree.node(child_index);
            let Some(child_pos) = layout.position(&child.id) else {
                continue;
            };

            let from = pos2(parent_pos.x, parent_pos.y + config.card_bottom);
            let to = pos2(child_pos.x, child_pos.y - config.card_top);
            let mid_y = (from.y + to.y) / 2.0;

            out.push(Connection {
                parent_id: parent.id.clone(),
                child_id: child.id.clone(),
                branch_number: branch + 1,
                from,
                to,
                badge: from.lerp(to, 0.5),
                controls: [pos2(from.x, mid_y), pos2(to.x, mid_y)],
            });
        }
    }

    out
}
