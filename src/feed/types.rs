use serde::Deserialize;
use serde_json::Value;

/// One unit of feed content. The accumulator never looks inside the payload;
/// `kind` is kept alongside so consumers can dispatch without re-parsing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub struct Item {
    pub kind: String,
    pub payload: Value,
}

impl Item {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self { kind: kind.into(), payload }
    }

    /// Nested child nodes, for section-like items (`RichSection`, `Shelf`, ...).
    pub fn children(&self) -> Option<Vec<Item>> {
        let contents = self.payload.get("contents")?.as_array()?;
        Some(contents.iter().cloned().map(Item::from).collect())
    }

    pub fn title(&self) -> Option<&str> {
        self.payload.get("title").and_then(Value::as_str)
    }
}

impl From<Value> for Item {
    fn from(payload: Value) -> Self {
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        Self { kind, payload }
    }
}

/// Top-level node of a page. Only the two list shapes carry items.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawContainer")]
pub enum ContentContainer {
    SectionList { contents: Vec<Item> },
    RichGrid { contents: Vec<Item> },
    Unknown { tag: String },
}

impl ContentContainer {
    pub fn tag(&self) -> &str {
        match self {
            ContentContainer::SectionList { .. } => "SectionList",
            ContentContainer::RichGrid { .. } => "RichGrid",
            ContentContainer::Unknown { tag } => tag,
        }
    }
}

#[derive(Deserialize)]
struct RawContainer {
    #[serde(rename = "type", default)]
    tag: Option<String>,
    #[serde(default)]
    contents: Vec<Item>,
}

impl From<RawContainer> for ContentContainer {
    fn from(raw: RawContainer) -> Self {
        match raw.tag.as_deref() {
            Some("SectionList") => ContentContainer::SectionList { contents: raw.contents },
            Some("RichGrid") => ContentContainer::RichGrid { contents: raw.contents },
            Some(other) => ContentContainer::Unknown { tag: other.to_string() },
            None => ContentContainer::Unknown { tag: "<missing>".to_string() },
        }
    }
}

/// Opaque server-issued handle for the next page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(pub String);

impl ContinuationToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single response from the remote feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page {
    pub contents: ContentContainer,
    #[serde(default)]
    pub continuation: Option<ContinuationToken>,
}

impl Page {
    pub fn new(contents: ContentContainer, continuation: Option<ContinuationToken>) -> Self {
        Self { contents, continuation }
    }

    pub fn content_container(&self) -> &ContentContainer {
        &self.contents
    }

    pub fn has_continuation(&self) -> bool {
        self.continuation.as_ref().is_some_and(|t| !t.0.is_empty())
    }
}
