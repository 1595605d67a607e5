//! Block model for Notion page content.
//!
//! `BlockKind` is deliberately small: the ten block types the bridge can
//! produce from markdown. Mechanism metadata lives in companion fields on
//! [`Block`] rather than in the enum:
//!
//! - `language` on Code: the fence info string, Notion's `language` field
//! - `checked` on ToDo: the checkbox state
//!
//! Blocks serialize to Notion's block JSON exactly (`to_json`) and parse the
//! supported subset back (`from_json`). The field names and nesting are a
//! compatibility contract with the hosted schema, not a local design choice.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Block type tag, named after Notion's wire values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum BlockKind {
    #[strum(serialize = "paragraph")]
    Paragraph,
    #[strum(serialize = "heading_1")]
    Heading1,
    #[strum(serialize = "heading_2")]
    Heading2,
    #[strum(serialize = "heading_3")]
    Heading3,
    #[strum(serialize = "bulleted_list_item")]
    BulletedListItem,
    #[strum(serialize = "numbered_list_item")]
    NumberedListItem,
    #[strum(serialize = "code")]
    Code,
    #[strum(serialize = "quote")]
    Quote,
    #[strum(serialize = "divider")]
    Divider,
    #[strum(serialize = "to_do")]
    ToDo,
}

impl BlockKind {
    /// Parse from the Notion wire name (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// The Notion wire name for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Heading1 => "heading_1",
            BlockKind::Heading2 => "heading_2",
            BlockKind::Heading3 => "heading_3",
            BlockKind::BulletedListItem => "bulleted_list_item",
            BlockKind::NumberedListItem => "numbered_list_item",
            BlockKind::Code => "code",
            BlockKind::Quote => "quote",
            BlockKind::Divider => "divider",
            BlockKind::ToDo => "to_do",
        }
    }

    /// List-item kinds participate in indentation nesting.
    pub fn is_list_item(&self) -> bool {
        matches!(
            self,
            BlockKind::BulletedListItem | BlockKind::NumberedListItem | BlockKind::ToDo
        )
    }
}

/// Emphasis flags on a text run, mirroring Notion's `annotations` object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub code: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Annotations {
    /// No emphasis at all; the annotations object can be omitted on the wire.
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }
}

/// One inline run of text with uniform emphasis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextRun {
    pub content: String,
    pub annotations: Annotations,
}

impl TextRun {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            annotations: Annotations::default(),
        }
    }

    pub fn styled(content: impl Into<String>, annotations: Annotations) -> Self {
        Self {
            content: content.into(),
            annotations,
        }
    }

    /// Length in characters. The remote ceiling counts characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    fn to_json(&self) -> serde_json::Value {
        let mut item = serde_json::json!({
            "type": "text",
            "text": { "content": self.content },
        });
        if !self.annotations.is_plain() {
            // serde skips the false flags, matching what Notion accepts
            item["annotations"] =
                serde_json::to_value(self.annotations).unwrap_or(serde_json::Value::Null);
        }
        item
    }

    fn from_json(item: &serde_json::Value) -> Option<Self> {
        let content = item
            .pointer("/text/content")
            .or_else(|| item.get("plain_text"))
            .and_then(serde_json::Value::as_str)?
            .to_string();
        let annotations = item
            .get("annotations")
            .and_then(|a| serde_json::from_value(a.clone()).ok())
            .unwrap_or_default();
        Some(Self {
            content,
            annotations,
        })
    }
}

/// One page content unit: a kind, its inline runs, and nested children.
///
/// Immutable once constructed; the chunker builds new blocks for its
/// size-driven splits rather than mutating these in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub rich_text: Vec<TextRun>,
    pub children: Vec<Block>,
    /// Fence info string for Code blocks (Notion's `language` field).
    pub language: Option<String>,
    /// Checkbox state for ToDo blocks.
    pub checked: bool,
}

impl Block {
    pub fn new(kind: BlockKind, rich_text: Vec<TextRun>) -> Self {
        Self {
            kind,
            rich_text,
            children: Vec::new(),
            language: None,
            checked: false,
        }
    }

    /// Single unstyled run.
    pub fn plain(kind: BlockKind, text: impl Into<String>) -> Self {
        Self::new(kind, vec![TextRun::plain(text)])
    }

    pub fn divider() -> Self {
        Self::new(BlockKind::Divider, Vec::new())
    }

    pub fn code(text: impl Into<String>, language: impl Into<String>) -> Self {
        let mut block = Self::plain(BlockKind::Code, text);
        block.language = Some(language.into());
        block
    }

    pub fn to_do(rich_text: Vec<TextRun>, checked: bool) -> Self {
        let mut block = Self::new(BlockKind::ToDo, rich_text);
        block.checked = checked;
        block
    }

    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    /// Concatenated run contents, without emphasis markers.
    pub fn plain_text(&self) -> String {
        self.rich_text
            .iter()
            .map(|run| run.content.as_str())
            .collect()
    }

    /// This block plus all descendants, the unit the per-request limit counts.
    pub fn count_recursive(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Block::count_recursive)
            .sum::<usize>()
    }

    /// Serialize to Notion's block schema.
    pub fn to_json(&self) -> serde_json::Value {
        let runs: Vec<serde_json::Value> = self.rich_text.iter().map(TextRun::to_json).collect();
        let mut payload = match self.kind {
            BlockKind::Divider => serde_json::json!({}),
            BlockKind::Code => serde_json::json!({
                "rich_text": runs,
                "language": self.language.as_deref().unwrap_or("plain text"),
            }),
            BlockKind::ToDo => serde_json::json!({
                "rich_text": runs,
                "checked": self.checked,
            }),
            _ => serde_json::json!({ "rich_text": runs }),
        };
        if !self.children.is_empty() {
            // Nested blocks ride inside the type payload on create/append.
            payload["children"] = serde_json::Value::Array(
                self.children.iter().map(Block::to_json).collect(),
            );
        }
        serde_json::json!({
            "object": "block",
            "type": self.kind.as_str(),
            self.kind.as_str(): payload,
        })
    }

    /// Parse a remote block of a supported kind; unsupported types yield None.
    ///
    /// Remote children are paginated behind a separate endpoint and are not
    /// inlined in list responses, so only the block itself is reconstructed.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let kind = BlockKind::from_str(value.get("type")?.as_str()?)?;
        let payload = value.get(kind.as_str())?;
        if kind == BlockKind::Divider {
            return Some(Block::divider());
        }
        let rich_text = payload
            .get("rich_text")
            .and_then(serde_json::Value::as_array)
            .map(|items| items.iter().filter_map(TextRun::from_json).collect())
            .unwrap_or_default();
        let mut block = Block::new(kind, rich_text);
        if kind == BlockKind::Code {
            block.language = payload
                .get("language")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned);
        }
        if kind == BlockKind::ToDo {
            block.checked = payload
                .get("checked")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
        }
        Some(block)
    }
}

/// Ordered top-level blocks produced by one conversion call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Total block count including nested children.
    pub fn block_count(&self) -> usize {
        self.blocks.iter().map(Block::count_recursive).sum()
    }
}

impl From<Vec<Block>> for Document {
    fn from(blocks: Vec<Block>) -> Self {
        Self::new(blocks)
    }
}
