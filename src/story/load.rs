use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use super::node::Story;
use super::parse::parse_story;

/// Reads a story document from `path`, or from stdin when the path is `-`.
pub fn load_story(path: &Path) -> Result<Story> {
    let raw = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read story document from stdin")?;
        buffer
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("failed to read story document {}", path.display()))?
    };

    let story = parse_story(&raw)
        .with_context(|| format!("failed to parse story document {}", path.display()))?;
    debug!(
        nodes = story.node_count(),
        legacy = story.is_legacy_linear(),
        "loaded story document"
    );
    Ok(story)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_file_reports_path() {
        let path = PathBuf::from("/definitely/not/here/story.json");
        let error = load_story(&path).expect_err("file does not exist");
        assert!(format!("{error:#}").contains("/definitely/not/here/story.json"));
    }

    #[test]
    fn reads_document_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "narrative-tree-load-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"[{"id": "a"}, {"id": "b", "parentId": "a"}]"#)
            .expect("write temp story");

        let story = load_story(&path);
        let _ = fs::remove_file(&path);

        let story = story.expect("story loads");
        assert_eq!(story.node_count(), 2);
        assert!(!story.is_legacy_linear());
    }
}
