/// Cuts `label` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate_label(label: &str, max_chars: usize) -> String {
    let mut chars = label.chars();
    let head = chars.by_ref().take(max_chars).collect::<String>();
    if chars.next().is_some() {
        format!("{head}…")
    } else {
        head
    }
}

/// Last eight characters of an id, enough to tell generated ids apart.
pub fn short_id(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(7)
        .map(|(index, _)| index)
        .unwrap_or(0);
    &id[start..]
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn short_labels_are_untouched() {
        assert_eq!(truncate_label("Open the door", 25), "Open the door");
        assert_eq!(truncate_label("", 25), "");
    }

    #[test]
    fn long_labels_are_cut_on_char_boundaries() {
        assert_eq!(
            truncate_label("Follow the lantern into the marsh", 25),
            "Follow the lantern into t…"
        );
        assert_eq!(truncate_label("ÄÖÜäöü", 3), "ÄÖÜ…");
    }

    #[test]
    fn short_id_keeps_the_tail() {
        assert_eq!(short_id("64f1c2a9e7b3d5f0a1b2c3d4"), "a1b2c3d4");
        assert_eq!(short_id("n7"), "n7");
    }
}
