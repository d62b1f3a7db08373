use super::types::{ContentContainer, Item};

/// Pull the ordered items out of a page container.
///
/// Never fails: an unrecognised container shape is logged and treated as
/// empty.
pub fn extract_items(container: &ContentContainer) -> Vec<Item> {
    match container {
        ContentContainer::SectionList { contents } | ContentContainer::RichGrid { contents } => {
            contents.clone()
        }
        ContentContainer::Unknown { tag } => {
            tracing::warn!(kind = %tag, "unknown type of feed node");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(n: usize) -> Vec<Item> {
        (0..n).map(|i| Item::from(json!({ "type": "RichItem", "i": i }))).collect()
    }

    #[test]
    fn test_section_list_yields_contents_in_order() {
        let c = ContentContainer::SectionList { contents: items(3) };
        let out = extract_items(&c);
        assert_eq!(out, items(3));
    }

    #[test]
    fn test_rich_grid_yields_contents() {
        let c = ContentContainer::RichGrid { contents: items(2) };
        assert_eq!(extract_items(&c).len(), 2);
    }

    #[test]
    fn test_unknown_shape_degrades_to_empty() {
        let c = ContentContainer::Unknown { tag: "Playlist".to_string() };
        assert!(extract_items(&c).is_empty());
    }
}
