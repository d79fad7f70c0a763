use tracing::trace;

use super::LayoutConfig;
use crate::story::StoryTree;

/// Gaps falling short by less than this are left alone.
const VIOLATION_EPSILON: f32 = 0.01;
const RECENTER_THRESHOLD: f32 = 1e-4;

/// Horizontal extent of a subtree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Span {
    pub(super) min: f32,
    pub(super) max: f32,
}

impl Span {
    fn around(x: f32, half_width: f32) -> Self {
        Self {
            min: x - half_width,
            max: x + half_width,
        }
    }

    pub(super) fn center(&self) -> f32 {
        (self.min + self.max) / 2.0
    }

    fn include(&mut self, other: Span) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    fn shifted(self, delta: f32) -> Self {
        Self {
            min: self.min + delta,
            max: self.max + delta,
        }
    }
}

fn fold_spans(xs: &[f32], parents: &[Option<usize>], half_width: f32) -> Vec<Span> {
    let mut spans = xs
        .iter()
        .map(|&x| Span::around(x, half_width))
        .collect::<Vec<_>>();
    for index in (0..xs.len()).rev() {
        if let Some(parent) = parents[index] {
            let span = spans[index];
            spans[parent].include(span);
        }
    }
    spans
}

pub(super) fn subtree_spans(tree: &StoryTree, xs: &[f32], half_width: f32) -> Vec<Span> {
    let parents = tree
        .nodes()
        .iter()
        .map(|node| node.parent)
        .collect::<Vec<_>>();
    fold_spans(xs, &parents, half_width)
}

/// Same as [`subtree_spans`] for a preorder sequence described only by
/// subtree sizes.
pub(super) fn spans_from_preorder(
    xs: &[f32],
    subtree_lens: impl Iterator<Item = usize>,
    half_width: f32,
) -> Vec<Span> {
    let mut parents = Vec::with_capacity(xs.len());
    let mut open: Vec<(usize, usize)> = Vec::new();
    for (index, len) in subtree_lens.enumerate() {
        while open.last().is_some_and(|&(_, end)| end <= index) {
            open.pop();
        }
        parents.push(open.last().map(|&(parent, _)| parent));
        open.push((index, index + len));
    }
    fold_spans(xs, &parents, half_width)
}

pub(super) fn shift_subtree(tree: &StoryTree, xs: &mut [f32], index: usize, delta: f32) {
    for x in &mut xs[tree.subtree(index)] {
        *x += delta;
    }
}

fn required_gap(tree: &StoryTree, left: usize, right: usize, config: &LayoutConfig) -> f32 {
    if tree.node(left).parent == tree.node(right).parent {
        config.sibling_gap
    } else {
        config.subtree_gap
    }
}

/// Pushes apart adjacent subtrees on one depth level until every gap holds or
/// the per-level cap runs out. Returns the number of pair shifts applied.
pub(super) fn relax_level(
    tree: &StoryTree,
    xs: &mut [f32],
    level: &[usize],
    config: &LayoutConfig,
) -> usize {
    if level.len() < 2 {
        return 0;
    }

    let half_width = config.half_width();
    let mut shifts = 0usize;

    for sweep in 0..config.level_iterations {
        let spans = subtree_spans(tree, xs, half_width);
        let mut row = level
            .iter()
            .map(|&index| (index, spans[index]))
            .collect::<Vec<_>>();
        row.sort_by(|a, b| a.1.center().total_cmp(&b.1.center()));

        let mut moved = 0usize;
        for pair in 0..row.len() - 1 {
            let (left, left_span) = row[pair];
            let (right, right_span) = row[pair + 1];
            let required = required_gap(tree, left, right, config);
            let gap = right_span.min - left_span.max;
            if gap >= required - VIOLATION_EPSILON {
                continue;
            }

            let half_missing = (required - gap) / 2.0;
            shift_subtree(tree, xs, left, -half_missing);
            shift_subtree(tree, xs, right, half_missing);
            row[pair].1 = left_span.shifted(-half_missing);
            row[pair + 1].1 = right_span.shifted(half_missing);
            moved += 1;
        }

        if moved == 0 {
            break;
        }
        trace!(
            depth = tree.node(level[0]).depth,
            sweep,
            moved,
            "relaxed level"
        );
        shifts += moved;
    }

    shifts
}

/// Post-order pass nudging every parent toward the mean x of its children.
/// Returns how many parents moved.
pub(super) fn recenter_parents(tree: &StoryTree, xs: &mut [f32], damping: f32) -> usize {
    let mut moved = 0;
    for index in tree.bottom_up() {
        let children = tree.children(index);
        if children.is_empty() {
            continue;
        }

        let mean = children.iter().map(|&child| xs[child]).sum::<f32>() / children.len() as f32;
        let shift = (mean - xs[index]) * damping;
        if shift.abs() > RECENTER_THRESHOLD {
            xs[index] += shift;
            moved += 1;
        }
    }
    moved
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::story::StoryNode;

    fn small_tree() -> StoryTree {
        let nodes = vec![
            StoryNode::new("r", 0),
            StoryNode::new("a", 1).with_parent("r", Some(0), None),
            StoryNode::new("b", 2).with_parent("r", Some(1), None),
            StoryNode::new("a1", 3).with_parent("a", Some(0), None),
        ];
        StoryTree::build(&nodes).expect("tree builds")
    }

    #[test]
    fn spans_cover_descendants() {
        let tree = small_tree();
        // preorder: r, a, a1, b
        let xs = [0.0, -100.0, -300.0, 100.0];
        let spans = subtree_spans(&tree, &xs, 80.0);
        assert_eq!(spans[0], Span { min: -380.0, max: 180.0 });
        assert_eq!(spans[1], Span { min: -380.0, max: -20.0 });
        assert_eq!(spans[3], Span { min: 20.0, max: 180.0 });

        let lens = tree.nodes().iter().map(|node| node.subtree_len);
        assert_eq!(spans_from_preorder(&xs, lens, 80.0), spans);
    }

    #[test]
    fn shifting_moves_the_whole_subtree_only() {
        let tree = small_tree();
        let mut xs = [0.0, -100.0, -300.0, 100.0];
        shift_subtree(&tree, &mut xs, 1, -10.0);
        assert_eq!(xs, [0.0, -110.0, -310.0, 100.0]);
    }

    #[test]
    fn relaxing_splits_the_missing_gap() {
        let tree = small_tree();
        let config = LayoutConfig::default();
        // a and b overlap by 160 + 40 - 100 = 100 units short of the gap
        let mut xs = [0.0, -50.0, -50.0, 50.0];
        let shifts = relax_level(&tree, &mut xs, &[1, 3], &config);
        assert_eq!(shifts, 1);
        assert_eq!(xs, [0.0, -100.0, -100.0, 100.0]);
    }

    #[test]
    fn relaxing_stops_at_the_sweep_cap() {
        let tree = small_tree();
        let config = LayoutConfig {
            level_iterations: 0,
            ..LayoutConfig::default()
        };
        let mut xs = [0.0, 0.0, 0.0, 0.0];
        assert_eq!(relax_level(&tree, &mut xs, &[1, 3], &config), 0);
        assert_eq!(xs, [0.0; 4]);
    }

    #[test]
    fn recentering_is_damped() {
        let tree = small_tree();
        let mut xs = [100.0, -100.0, -100.0, 100.0];
        assert_eq!(recenter_parents(&tree, &mut xs, 0.8), 1);
        // a already sits over a1; the root moves 80% of the way to 0
        assert_eq!(xs[1], -100.0);
        assert!((xs[0] - 20.0).abs() < 1e-4);
    }

    #[test]
    fn centered_parents_report_no_moves() {
        let tree = small_tree();
        let mut xs = [0.0, -100.0, -100.0, 100.0];
        assert_eq!(recenter_parents(&tree, &mut xs, 0.8), 0);
        assert_eq!(xs, [0.0, -100.0, -100.0, 100.0]);
    }
}
