use serde::Serialize;
use tracing::debug;

use crate::story::StoryNode;

/// How an existing child was matched to the chosen option.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChoiceMatch {
    Index,
    /// The child predates choice indices and matched on option text.
    LegacyText,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChoiceOutcome {
    Existing { id: String, matched: ChoiceMatch },
    NewBranch,
}

impl ChoiceOutcome {
    pub fn existing_id(&self) -> Option<&str> {
        match self {
            Self::Existing { id, .. } => Some(id.as_str()),
            Self::NewBranch => None,
        }
    }
}

/// One option of the current node and the child already exploring it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionState {
    pub index: usize,
    pub text: String,
    pub explored_by: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub explored_count: usize,
    pub total_choices: usize,
    pub percent: u8,
}

fn match_child(node: &StoryNode, choice_text: &str, choice_index: usize) -> Option<ChoiceMatch> {
    match node.parent_choice_index {
        Some(index) => (index == choice_index).then_some(ChoiceMatch::Index),
        None => (node.parent_choice_text.as_deref() == Some(choice_text))
            .then_some(ChoiceMatch::LegacyText),
    }
}

/// Finds the child of `current_id` that already represents the chosen
/// option. Children carrying a choice index only match by index.
pub fn resolve_choice(
    nodes: &[StoryNode],
    current_id: Option<&str>,
    choice_text: &str,
    choice_index: usize,
) -> ChoiceOutcome {
    let Some(current_id) = current_id else {
        return ChoiceOutcome::NewBranch;
    };

    let found = nodes
        .iter()
        .filter(|node| node.parent_id.as_deref() == Some(current_id))
        .find_map(|node| {
            match_child(node, choice_text, choice_index).map(|matched| (node, matched))
        });

    match found {
        Some((node, matched)) => {
            if matched == ChoiceMatch::LegacyText {
                debug!(
                    parent = current_id,
                    child = %node.id,
                    choice = choice_text,
                    "reused branch matched by option text"
                );
            }
            ChoiceOutcome::Existing {
                id: node.id.clone(),
                matched,
            }
        }
        None => ChoiceOutcome::NewBranch,
    }
}

pub fn option_states(nodes: &[StoryNode], current_id: Option<&str>) -> Vec<OptionState> {
    let Some(current) = current_id.and_then(|id| nodes.iter().find(|node| node.id == id)) else {
        return Vec::new();
    };

    current
        .choice_options
        .iter()
        .enumerate()
        .map(|(index, text)| OptionState {
            index,
            text: text.clone(),
            explored_by: resolve_choice(nodes, Some(&current.id), text, index)
                .existing_id()
                .map(str::to_owned),
        })
        .collect()
}

/// Story-wide exploration: every node with a parent reference stands for one
/// explored option.
pub fn progress(nodes: &[StoryNode]) -> Progress {
    let explored_count = nodes
        .iter()
        .filter(|node| node.parent_id.as_deref().is_some_and(|id| !id.is_empty()))
        .count();
    let total_choices = nodes.iter().map(|node| node.choice_options.len()).sum::<usize>();

    let percent = if total_choices == 0 {
        0
    } else {
        let ratio = explored_count as f64 / total_choices as f64 * 100.0;
        ratio.min(100.0).round() as u8
    };

    Progress {
        explored_count,
        total_choices,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn index_wins_even_after_text_changes() {
        let nodes = vec![
            StoryNode::new("p", 0).with_choices(["Open the door", "Knock twice"]),
            StoryNode::new("c0", 1).with_parent("p", Some(0), Some("Open the door")),
            StoryNode::new("c1", 2).with_parent("p", Some(1), Some("Knock")),
        ];

        let outcome = resolve_choice(&nodes, Some("p"), "Knock twice", 1);
        assert_eq!(
            outcome,
            ChoiceOutcome::Existing {
                id: "c1".to_owned(),
                matched: ChoiceMatch::Index,
            }
        );
    }

    #[test]
    fn duplicate_option_text_is_told_apart_by_index() {
        let nodes = vec![
            StoryNode::new("p", 0).with_choices(["Wait", "Wait"]),
            StoryNode::new("c0", 1).with_parent("p", Some(0), Some("Wait")),
        ];
        assert_eq!(
            resolve_choice(&nodes, Some("p"), "Wait", 0).existing_id(),
            Some("c0")
        );
        assert_eq!(
            resolve_choice(&nodes, Some("p"), "Wait", 1),
            ChoiceOutcome::NewBranch
        );
    }

    #[test]
    fn legacy_children_match_on_text() {
        let nodes = vec![
            StoryNode::new("p", 0).with_choices(["Run", "Hide"]),
            StoryNode::new("old", 1).with_parent("p", None, Some("Hide")),
        ];
        assert_eq!(
            resolve_choice(&nodes, Some("p"), "Hide", 1),
            ChoiceOutcome::Existing {
                id: "old".to_owned(),
                matched: ChoiceMatch::LegacyText,
            }
        );
        assert_eq!(
            resolve_choice(&nodes, Some("p"), "Run", 0),
            ChoiceOutcome::NewBranch
        );
    }

    #[test]
    fn only_children_of_the_current_node_count() {
        let nodes = vec![
            StoryNode::new("p", 0).with_choices(["Go"]),
            StoryNode::new("q", 1).with_choices(["Go"]),
            StoryNode::new("other", 2).with_parent("q", Some(0), Some("Go")),
        ];
        assert_eq!(
            resolve_choice(&nodes, Some("p"), "Go", 0),
            ChoiceOutcome::NewBranch
        );
    }

    #[test]
    fn no_current_node_is_never_a_match() {
        let nodes = vec![StoryNode::new("p", 0).with_choices(["Go"])];
        assert_eq!(resolve_choice(&nodes, None, "Go", 0), ChoiceOutcome::NewBranch);
        assert_eq!(resolve_choice(&[], Some("p"), "Go", 0), ChoiceOutcome::NewBranch);
        assert!(option_states(&nodes, None).is_empty());
    }

    #[test]
    fn option_states_mark_explored_options() {
        let nodes = vec![
            StoryNode::new("p", 0).with_choices(["Left", "Right", "Back"]),
            StoryNode::new("r", 1).with_parent("p", Some(1), Some("Right")),
        ];
        assert_eq!(
            option_states(&nodes, Some("p")),
            vec![
                OptionState {
                    index: 0,
                    text: "Left".to_owned(),
                    explored_by: None,
                },
                OptionState {
                    index: 1,
                    text: "Right".to_owned(),
                    explored_by: Some("r".to_owned()),
                },
                OptionState {
                    index: 2,
                    text: "Back".to_owned(),
                    explored_by: None,
                },
            ]
        );
    }

    #[test]
    fn progress_counts_every_explored_choice() {
        let nodes = vec![
            StoryNode::new("root", 0).with_choices(["a", "b", "c"]),
            StoryNode::new("child", 1)
                .with_choices(["d", "e", "f"])
                .with_parent("root", Some(0), Some("a")),
        ];
        assert_eq!(
            progress(&nodes),
            Progress {
                explored_count: 1,
                total_choices: 6,
                percent: 17,
            }
        );
    }

    #[test]
    fn progress_is_capped_and_defined_for_no_choices() {
        assert_eq!(progress(&[]), Progress::default());

        let nodes = vec![
            StoryNode::new("root", 0).with_choices(["only"]),
            StoryNode::new("a", 1).with_parent("root", Some(0), None),
            StoryNode::new("b", 2).with_parent("root", Some(0), None),
        ];
        assert_eq!(progress(&nodes).percent, 100);
    }

    #[test]
    fn orphans_count_as_explored() {
        let nodes = vec![
            StoryNode::new("root", 0).with_choices(["north", "south"]),
            StoryNode::new("north", 1).with_parent("root", Some(0), Some("north")),
            StoryNode::new("stray", 2)
                .with_choices(["wait", "call out"])
                .with_parent("missing", Some(0), Some("wander")),
        ];
        assert_eq!(
            progress(&nodes),
            Progress {
                explored_count: 2,
                total_choices: 4,
                percent: 50,
            }
        );
    }
}
