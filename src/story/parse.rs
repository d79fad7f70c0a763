use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::node::{Story, StoryMeta, StoryNode};
use crate::layout::LayoutConfig;

#[derive(Clone, Debug, Deserialize)]
pub(super) struct RawStoryNode {
    #[serde(alias = "_id")]
    pub(super) id: Value,
    #[serde(default)]
    pub(super) content: Option<String>,
    #[serde(default, rename = "imageUrl")]
    pub(super) image_url: Option<String>,
    #[serde(default, rename = "choiceOptions", alias = "choices")]
    pub(super) choice_options: Option<Vec<String>>,
    #[serde(default, rename = "parentId", alias = "parentNodeId")]
    pub(super) parent_id: Option<Value>,
    #[serde(default, rename = "parentChoiceText")]
    pub(super) parent_choice_text: Option<String>,
    #[serde(default, rename = "parentChoiceIndex")]
    pub(super) parent_choice_index: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
struct RawStoryMeta {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    genre: Option<String>,
    #[serde(default)]
    setting: Option<String>,
    #[serde(default, rename = "mainCharacter")]
    main_character: Option<String>,
}

/// Parses either a bare node array or a `{ "nodes": [...] }` document.
pub fn parse_story(raw: &str) -> Result<Story> {
    let parsed: Value = serde_json::from_str(raw).context("invalid JSON in story document")?;

    match &parsed {
        Value::Array(items) => Ok(Story::from_nodes(parse_nodes(items)?)),
        Value::Object(object) => {
            let items = object
                .get("nodes")
                .and_then(Value::as_array)
                .ok_or_else(|| anyhow!("story document has no `nodes` array"))?;

            let meta = RawStoryMeta::deserialize(&parsed).context("invalid story metadata")?;
            let layout = match object.get("layout") {
                Some(Value::Null) | None => None,
                Some(value) => Some(
                    LayoutConfig::deserialize(value).context("invalid `layout` block in story")?,
                ),
            };

            Ok(Story {
                meta: StoryMeta {
                    title: non_empty(meta.title),
                    genre: non_empty(meta.genre),
                    setting: non_empty(meta.setting),
                    main_character: non_empty(meta.main_character),
                },
                nodes: parse_nodes(items)?,
                layout,
            })
        }
        _ => Err(anyhow!("unexpected JSON type for a story document")),
    }
}

pub(super) fn parse_nodes(items: &[Value]) -> Result<Vec<StoryNode>> {
    let mut nodes = Vec::with_capacity(items.len());

    for (position, value) in items.iter().enumerate() {
        let raw = RawStoryNode::deserialize(value)
            .with_context(|| format!("invalid story node at position {position}"))?;

        let Some(id) = normalize_id(&raw.id) else {
            warn!(position, "skipping story node without a usable id");
            continue;
        };

        let parent_id = raw.parent_id.as_ref().and_then(normalize_id);
        let parent_choice_index = raw
            .parent_choice_index
            .and_then(|index| usize::try_from(index).ok());

        nodes.push(StoryNode {
            id,
            sequence_index: nodes.len(),
            content: raw.content.unwrap_or_default(),
            image_url: non_empty(raw.image_url),
            choice_options: raw.choice_options.unwrap_or_default(),
            parent_id,
            parent_choice_text: non_empty(raw.parent_choice_text),
            parent_choice_index,
        });
    }

    Ok(nodes)
}

/// Ids arrive as strings or as plain numbers; anything else is unusable.
pub(super) fn normalize_id(value: &Value) -> Option<String> {
    let id = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}
