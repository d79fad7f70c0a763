use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use serde::Serialize;

use crate::story::StoryNode;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub id: String,
    pub score: i64,
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_lowercase(), &query.to_lowercase()))
}

/// Nodes whose narrative or incoming choice text matches `query`, best first.
pub fn find_nodes(nodes: &[StoryNode], query: &str, limit: usize) -> Vec<SearchHit> {
    let query = query.trim();
    if query.is_empty() || limit == 0 {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut hits = nodes
        .iter()
        .filter_map(|node| {
            let content = fuzzy_match_score(&matcher, &node.content, query);
            let choice = node
                .parent_choice_text
                .as_deref()
                .and_then(|text| fuzzy_match_score(&matcher, text, query));
            content.max(choice).map(|score| (node, score))
        })
        .collect::<Vec<_>>();

    hits.sort_by(|(a, a_score), (b, b_score)| {
        b_score
            .cmp(a_score)
            .then(a.sequence_index.cmp(&b.sequence_index))
    });

    hits.into_iter()
        .take(limit)
        .map(|(node, score)| SearchHit {
            id: node.id.clone(),
            score,
        })
        .collect()
}
