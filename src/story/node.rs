use serde::Serialize;

/// One beat of the narrative as handed over by storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryNode {
    pub id: String,
    pub sequence_index: usize,
    pub content: String,
    pub image_url: Option<String>,
    pub choice_options: Vec<String>,
    pub parent_id: Option<String>,
    pub parent_choice_text: Option<String>,
    pub parent_choice_index: Option<usize>,
}

impl StoryNode {
    pub fn new(id: impl Into<String>, sequence_index: usize) -> Self {
        Self {
            id: id.into(),
            sequence_index,
            ..Self::default()
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    pub fn with_choices<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choice_options = options.into_iter().map(Into::into).collect();
        self
    }

    /// Links this node under `parent_id`, recording the option that led here.
    pub fn with_parent(
        mut self,
        parent_id: impl Into<String>,
        choice_index: Option<usize>,
        choice_text: Option<&str>,
    ) -> Self {
        self.parent_id = Some(parent_id.into());
        self.parent_choice_index = choice_index;
        self.parent_choice_text = choice_text.map(str::to_owned);
        self
    }

    /// 1-based number shown next to the node.
    pub fn display_number(&self) -> usize {
        self.sequence_index + 1
    }

    pub fn has_parent_link(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Story-level metadata that travels with the node list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryMeta {
    pub title: Option<String>,
    pub genre: Option<String>,
    pub setting: Option<String>,
    pub main_character: Option<String>,
}

/// A fully parsed story document.
#[derive(Clone, Debug, Default)]
pub struct Story {
    pub meta: StoryMeta,
    pub nodes: Vec<StoryNode>,
    pub layout: Option<crate::layout::LayoutConfig>,
}

impl Story {
    pub fn from_nodes(nodes: Vec<StoryNode>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// True when no node carries a parent reference at all.
    pub fn is_legacy_linear(&self) -> bool {
        is_legacy_linear(&self.nodes)
    }
}

pub fn is_legacy_linear(nodes: &[StoryNode]) -> bool {
    !nodes.iter().any(StoryNode::has_parent_link)
}

pub fn find_node<'a>(nodes: &'a [StoryNode], id: &str) -> Option<&'a StoryNode> {
    nodes.iter().find(|node| node.id == id)
}
