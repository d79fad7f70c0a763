use std::collections::HashMap;
use std::fmt::Write;

use crate::navigator::ActivePath;
use crate::story::{StoryNode, StoryTree};
use crate::util::{short_id, truncate_label};

const LABEL_CHARS: usize = 25;

/// Indented list view of the tree in preorder. `>` marks the current node,
/// `*` the rest of the active path.
pub fn render_outline(tree: Option<&StoryTree>, nodes: &[StoryNode], path: &ActivePath) -> String {
    let mut out = String::new();
    let Some(tree) = tree else {
        return out;
    };

    let mut by_id: HashMap<&str, &StoryNode> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        by_id.entry(node.id.as_str()).or_insert(node);
    }

    for tree_node in tree.nodes() {
        let marker = if path.current() == Some(tree_node.id.as_str()) {
            '>'
        } else if path.contains(&tree_node.id) {
            '*'
        } else {
            '-'
        };

        let _ = write!(
            out,
            "{:indent$}{marker} #{} [{}]",
            "",
            tree_node.sequence_index + 1,
            short_id(&tree_node.id),
            indent = tree_node.depth * 2,
        );
        if let Some(node) = by_id.get(tree_node.id.as_str()) {
            if let Some(label) = &node.parent_choice_text {
                let _ = write!(out, " {}", truncate_label(label, LABEL_CHARS));
            }
            match node.choice_options.len() {
                0 => {}
                1 => out.push_str(" (1 choice)"),
                count => {
                    let _ = write!(out, " ({count} choices)");
                }
            }
        }
        out.push('\n');
    }

    if !tree.unreachable().is_empty() {
        out.push_str("unreachable:\n");
        for id in tree.unreachable() {
            let number = by_id
                .get(id.as_str())
                .map(|node| node.display_number())
                .unwrap_or_default();
            let _ = writeln!(out, "  #{number} [{}]", short_id(id));
        }
    }

    out
}
