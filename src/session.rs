use std::fmt::Write;

use emath::Rect;
use serde::Serialize;
use tracing::{debug, warn};

use crate::layout::{Connection, LayoutConfig, PlacedNode, TreeLayout, connections, layout_tree};
use crate::navigator::{
    ActivePath, ChoiceMatch, ChoiceOutcome, EdgeState, OptionState, Progress, option_states,
    progress, resolve_choice,
};
use crate::story::{Story, StoryMeta, StoryNode, StoryTree, find_node};

const TRANSCRIPT_RULE: usize = 50;
const CHAPTER_RULE: usize = 30;

/// What the persistence side needs to create the node for a new branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNodeRequest {
    pub parent_id: String,
    pub choice_text: String,
    pub choice_index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChoiceStep {
    /// An existing child was appended to the active path.
    Reused { id: String, matched: ChoiceMatch },
    NeedsNode(NewNodeRequest),
    Unavailable,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEdge {
    #[serde(flatten)]
    pub connection: Connection,
    pub state: EdgeState,
}

/// Everything a renderer needs for one frame of the story map.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub revision: u64,
    pub meta: StoryMeta,
    pub root_id: Option<String>,
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<SnapshotEdge>,
    pub canvas: Option<Rect>,
    pub active_path: ActivePath,
    pub current_id: Option<String>,
    pub progress: Progress,
    pub options: Vec<OptionState>,
    pub backdrop_image: Option<String>,
    pub unreachable: Vec<String>,
}

/// One reader's view of a story: the node list plus the derived tree, layout
/// and active path.
pub struct ReaderSession {
    meta: StoryMeta,
    nodes: Vec<StoryNode>,
    config: LayoutConfig,
    tree: Option<StoryTree>,
    layout_cache: Option<TreeLayout>,
    layout_dirty: bool,
    revision: u64,
    path: ActivePath,
}

impl ReaderSession {
    pub fn new(story: Story, config: LayoutConfig) -> Self {
        let path = ActivePath::initialize(&story.nodes);
        let mut session = Self {
            meta: story.meta,
            nodes: story.nodes,
            config: config.sanitized(),
            tree: None,
            layout_cache: None,
            layout_dirty: true,
            revision: 0,
            path,
        };
        session.rebuild_tree();
        session
    }

    fn rebuild_tree(&mut self) {
        self.revision = self.revision.wrapping_add(1);
        self.tree = StoryTree::build(&self.nodes);
        self.layout_dirty = true;
    }

    /// Swaps in a fresh node list. The active path survives when it still
    /// describes a contiguous chain of existing nodes.
    pub fn replace_nodes(&mut self, nodes: Vec<StoryNode>) {
        self.nodes = nodes;
        self.rebuild_tree();

        if self.path.is_empty() || !self.path.is_contiguous(&self.nodes) {
            debug!(revision = self.revision, "active path reset after node refresh");
            self.path = ActivePath::initialize(&self.nodes);
        }
    }

    pub fn nodes(&self) -> &[StoryNode] {
        &self.nodes
    }

    pub fn meta(&self) -> &StoryMeta {
        &self.meta
    }

    pub fn tree(&self) -> Option<&StoryTree> {
        self.tree.as_ref()
    }

    pub fn path(&self) -> &ActivePath {
        &self.path
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn layout(&mut self) -> &TreeLayout {
        if self.layout_dirty {
            self.layout_cache = Some(layout_tree(self.tree.as_ref(), &self.config));
            self.layout_dirty = false;
        }
        self.layout_cache.get_or_insert_default()
    }

    pub fn current_node(&self) -> Option<&StoryNode> {
        self.path
            .current()
            .and_then(|id| find_node(&self.nodes, id))
    }

    /// Resolves option `index` of the current node against its children.
    pub fn choose(&mut self, index: usize) -> ChoiceStep {
        let Some(current) = self.current_node() else {
            return ChoiceStep::Unavailable;
        };
        let Some(text) = current.choice_options.get(index) else {
            debug!(
                node = %current.id,
                index,
                options = current.choice_options.len(),
                "choice index out of range"
            );
            return ChoiceStep::Unavailable;
        };
        let parent_id = current.id.clone();
        let text = text.clone();

        match resolve_choice(&self.nodes, Some(&parent_id), &text, index) {
            ChoiceOutcome::Existing { id, matched } => {
                self.path.extend(id.clone());
                ChoiceStep::Reused { id, matched }
            }
            ChoiceOutcome::NewBranch => ChoiceStep::NeedsNode(NewNodeRequest {
                parent_id,
                choice_text: text,
                choice_index: index,
            }),
        }
    }

    /// Records a node the persistence side has stored. Returns whether the
    /// active path now ends on it. An empty path is started afresh.
    pub fn confirm_node(&mut self, mut node: StoryNode) -> bool {
        node.sequence_index = self.nodes.len();
        let id = node.id.clone();
        let follows_tail =
            node.parent_id.is_some() && node.parent_id.as_deref() == self.path.current();

        self.nodes.push(node);
        self.rebuild_tree();

        if follows_tail {
            self.path.extend(id);
        } else if self.path.is_empty() {
            self.path = ActivePath::initialize(&self.nodes);
            debug!(node = %id, path = ?self.path.ids(), "active path started");
            return self.path.contains(&id);
        } else {
            warn!(
                node = %id,
                current = ?self.path.current(),
                "confirmed node does not continue the active path"
            );
        }
        follows_tail
    }

    pub fn jump_to(&mut self, id: &str) -> bool {
        self.path.jump_to(&self.nodes, id)
    }

    pub fn progress(&self) -> Progress {
        progress(&self.nodes)
    }

    pub fn option_states(&self) -> Vec<OptionState> {
        option_states(&self.nodes, self.path.current())
    }

    /// The current node's image, or the closest one earlier on the path.
    pub fn backdrop_image(&self) -> Option<&str> {
        self.path
            .ids()
            .iter()
            .rev()
            .filter_map(|id| find_node(&self.nodes, id))
            .find_map(|node| node.image_url.as_deref())
    }

    /// Plain-text export of the chapters on the active path.
    pub fn transcript(&self) -> String {
        let mut text = String::new();

        let header = [
            (None, self.meta.title.as_deref()),
            (Some("Genre"), self.meta.genre.as_deref()),
            (Some("Setting"), self.meta.setting.as_deref()),
            (Some("Main character"), self.meta.main_character.as_deref()),
        ];
        let mut wrote_header = false;
        for (label, value) in header {
            let Some(value) = value else {
                continue;
            };
            let _ = match label {
                Some(label) => writeln!(text, "{label}: {value}"),
                None => writeln!(text, "{value}"),
            };
            wrote_header = true;
        }
        if wrote_header {
            text.push('\n');
        }

        let _ = writeln!(text, "{}\n", "=".repeat(TRANSCRIPT_RULE));

        let chapters = self
            .path
            .ids()
            .iter()
            .filter_map(|id| find_node(&self.nodes, id));
        for (number, node) in chapters.enumerate() {
            let _ = writeln!(text, "Chapter {}", number + 1);
            let _ = writeln!(text, "{}", "-".repeat(CHAPTER_RULE));
            let _ = writeln!(text, "{}\n", node.content);
            if let Some(choice) = &node.parent_choice_text {
                let _ = writeln!(text, "> Your choice: {choice}\n");
            }
        }

        text
    }

    pub fn snapshot(&mut self) -> SessionSnapshot {
        let config = self.config;
        let layout = self.layout().clone();

        let edges = match &self.tree {
            Some(tree) => connections(tree, &layout, &config)
                .into_iter()
                .map(|connection| SnapshotEdge {
                    state: self
                        .path
                        .edge_state(&connection.parent_id, &connection.child_id),
                    connection,
                })
                .collect(),
            None => Vec::new(),
        };

        SessionSnapshot {
            revision: self.revision,
            meta: self.meta.clone(),
            root_id: self.tree.as_ref().map(|tree| tree.root_id().to_owned()),
            canvas: layout.canvas_bounds(&config),
            nodes: layout.nodes().to_vec(),
            edges,
            active_path: self.path.clone(),
            current_id: self.path.current().map(str::to_owned),
            progress: self.progress(),
            options: self.option_states(),
            backdrop_image: self.backdrop_image().map(str::to_owned),
            unreachable: self
                .tree
                .as_ref()
                .map(|tree| tree.unreachable().to_vec())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn story() -> Story {
        Story {
            meta: StoryMeta {
                title: Some("Salt Road".to_owned()),
                genre: Some("adventure".to_owned()),
                ..StoryMeta::default()
            },
            nodes: vec![
                StoryNode::new("root", 0)
                    .with_content("The caravan stops at dusk.")
                    .with_image("dusk.png")
                    .with_choices(["Make camp", "Press on"]),
                StoryNode::new("camp", 1)
                    .with_content("Fires are lit.")
                    .with_choices(["Keep watch", "Sleep"])
                    .with_parent("root", Some(0), Some("Make camp")),
            ],
            layout: None,
        }
    }

    #[test]
    fn starts_on_the_first_branch() {
        let session = ReaderSession::new(story(), LayoutConfig::default());
        assert_eq!(session.path().ids(), ["root", "camp"]);
        assert_eq!(session.current_node().map(|node| node.id.as_str()), Some("camp"));
        assert_eq!(session.backdrop_image(), Some("dusk.png"));
    }

    #[test]
    fn revisiting_a_choice_reuses_the_child() {
        let mut session = ReaderSession::new(story(), LayoutConfig::default());
        assert!(session.jump_to("root"));
        assert_eq!(
            session.choose(0),
            ChoiceStep::Reused {
                id: "camp".to_owned(),
                matched: ChoiceMatch::Index,
            }
        );
        assert_eq!(session.path().ids(), ["root", "camp"]);
        assert_eq!(session.nodes().len(), 2);
    }

    #[test]
    fn new_branch_waits_for_confirmation() {
        let mut session = ReaderSession::new(story(), LayoutConfig::default());
        let step = session.choose(1);
        assert_eq!(
            step,
            ChoiceStep::NeedsNode(NewNodeRequest {
                parent_id: "camp".to_owned(),
                choice_text: "Sleep".to_owned(),
                choice_index: 1,
            })
        );
        assert_eq!(session.path().len(), 2);

        let revision = session.revision();
        let extended = session.confirm_node(
            StoryNode::new("dream", 99)
                .with_content("You dream of rivers.")
                .with_parent("camp", Some(1), Some("Sleep")),
        );
        assert!(extended);
        assert!(session.revision() > revision);
        assert_eq!(session.path().ids(), ["root", "camp", "dream"]);
        assert_eq!(session.nodes()[2].sequence_index, 2);
        assert_eq!(session.tree().map(StoryTree::len), Some(3));
    }

    #[test]
    fn confirming_off_path_leaves_path_alone() {
        let mut session = ReaderSession::new(story(), LayoutConfig::default());
        let extended = session
            .confirm_node(StoryNode::new("dash", 5).with_parent("root", Some(1), Some("Press on")));
        assert!(!extended);
        assert_eq!(session.path().ids(), ["root", "camp"]);
    }

    #[test]
    fn first_node_of_an_empty_story_starts_the_path() {
        let mut session = ReaderSession::new(Story::default(), LayoutConfig::default());
        assert!(session.path().is_empty());

        let extended = session.confirm_node(StoryNode::new("root", 0).with_choices(["Go"]));
        assert!(extended);
        assert_eq!(session.path().ids(), ["root"]);
        assert_eq!(session.current_node().map(|node| node.id.as_str()), Some("root"));
        assert_eq!(
            session.choose(0),
            ChoiceStep::NeedsNode(NewNodeRequest {
                parent_id: "root".to_owned(),
                choice_text: "Go".to_owned(),
                choice_index: 0,
            })
        );
    }

    #[test]
    fn out_of_range_choice_is_unavailable() {
        let mut session = ReaderSession::new(story(), LayoutConfig::default());
        assert_eq!(session.choose(7), ChoiceStep::Unavailable);

        let mut empty = ReaderSession::new(Story::default(), LayoutConfig::default());
        assert_eq!(empty.choose(0), ChoiceStep::Unavailable);
        assert!(empty.layout().is_empty());
    }

    #[test]
    fn refresh_keeps_a_valid_path_and_resets_a_broken_one() {
        let mut session = ReaderSession::new(story(), LayoutConfig::default());
        let mut nodes = story().nodes;
        nodes.push(StoryNode::new("dash", 2).with_parent("root", Some(1), Some("Press on")));
        session.replace_nodes(nodes);
        assert_eq!(session.path().ids(), ["root", "camp"]);

        assert!(session.jump_to("dash"));
        session.replace_nodes(story().nodes);
        assert_eq!(session.path().ids(), ["root", "camp"]);
    }

    #[test]
    fn transcript_lists_chapters_on_the_path() {
        let session = ReaderSession::new(story(), LayoutConfig::default());
        let expected = format!(
            "Salt Road\nGenre: adventure\n\n{}\n\nChapter 1\n{}\nThe caravan stops at dusk.\n\n\
             Chapter 2\n{}\nFires are lit.\n\n> Your choice: Make camp\n\n",
            "=".repeat(50),
            "-".repeat(30),
            "-".repeat(30),
        );
        assert_eq!(session.transcript(), expected);
    }

    #[test]
    fn snapshot_marks_the_current_edge() {
        let mut session = ReaderSession::new(story(), LayoutConfig::default());
        let snapshot = session.snapshot();

        assert_eq!(snapshot.root_id.as_deref(), Some("root"));
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.edges.len(), 1);
        assert_eq!(snapshot.edges[0].state, EdgeState::Current);
        assert_eq!(snapshot.current_id.as_deref(), Some("camp"));
        assert_eq!(snapshot.progress.explored_count, 1);
        assert_eq!(snapshot.progress.total_choices, 4);
        assert_eq!(snapshot.progress.percent, 25);
        assert_eq!(snapshot.options.len(), 2);
        assert!(snapshot.canvas.is_some());

        let json = serde_json::to_value(&snapshot).expect("snapshot serializes");
        assert_eq!(json["edges"][0]["branchNumber"], 1);
        assert_eq!(json["edges"][0]["state"], "current");
        assert_eq!(json["activePath"], serde_json::json!(["root", "camp"]));
        assert_eq!(json["progress"]["exploredCount"], 1);
    }
}
