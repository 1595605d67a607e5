//! Markdown ⇄ block conversion.
//!
//! The line classifier is deliberately narrower than CommonMark: only 1–3
//! `#` headings are recognized, dividers must be a lone run of `-`/`*`/`_`,
//! and an unterminated code fence closes at end-of-input instead of erroring.
//! Every line that matches no rule degrades to a paragraph, so conversion is
//! total over any input.
//!
//! Inline emphasis inside a line is parsed with pulldown-cmark events,
//! tracking a depth counter per style:
//!
//! ```text
//! "**bold** and *italic*"
//!     ↓ pulldown-cmark events
//! [TextRun { bold, "bold" }, TextRun { " and " }, TextRun { italic, "italic" }]
//! ```
//!
//! Unmatched markers come back from the parser as literal text, which is
//! exactly the fail-open behavior we want.

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

use crate::block::{Annotations, Block, BlockKind, Document, TextRun};

/// Conversion options.
#[derive(Clone, Copy, Debug)]
pub struct ConvertOptions {
    /// Spaces per nesting level for indented list items. Indentation that is
    /// not a multiple of this rounds down.
    pub indent_width: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { indent_width: 2 }
    }
}

/// Convert markdown-flavoured text into an ordered block document.
///
/// Deterministic and side-effect-free; classification is a single
/// top-to-bottom pass with first-match-wins rules. Blank lines separate
/// blocks and produce nothing themselves.
pub fn convert(text: &str, options: &ConvertOptions) -> Document {
    let indent_width = options.indent_width.max(1);
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks: Vec<Block> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let raw = lines[i];
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            i += 1;
            continue;
        }

        // Fenced code consumes everything verbatim until the closing fence,
        // or end-of-input when none appears.
        if let Some(info) = trimmed.strip_prefix("```") {
            let language = info.trim();
            let mut body: Vec<&str> = Vec::new();
            i += 1;
            while i < lines.len() && !lines[i].trim().starts_with("```") {
                body.push(lines[i]);
                i += 1;
            }
            if i < lines.len() {
                // skip the closing fence
                i += 1;
            }
            blocks.push(Block::code(
                body.join("\n"),
                if language.is_empty() {
                    "plain text"
                } else {
                    language
                },
            ));
            continue;
        }

        let block = classify_line(trimmed);
        let depth = leading_spaces(raw) / indent_width;
        if depth > 0 && block.kind.is_list_item() {
            attach_list_item(&mut blocks, depth, block);
        } else {
            blocks.push(block);
        }
        i += 1;
    }

    Document::new(blocks)
}

/// Classify one trimmed, non-empty line. First match wins; anything
/// unrecognized is a paragraph.
fn classify_line(line: &str) -> Block {
    if let Some((level, rest)) = heading_prefix(line) {
        let kind = match level {
            1 => BlockKind::Heading1,
            2 => BlockKind::Heading2,
            _ => BlockKind::Heading3,
        };
        return Block::new(kind, inline_runs(rest));
    }
    if let Some(rest) = bullet_prefix(line) {
        if let Some((checked, rest)) = todo_prefix(rest) {
            return Block::to_do(inline_runs(rest), checked);
        }
        return Block::new(BlockKind::BulletedListItem, inline_runs(rest));
    }
    if let Some(rest) = numbered_prefix(line) {
        return Block::new(BlockKind::NumberedListItem, inline_runs(rest));
    }
    if is_divider(line) {
        return Block::divider();
    }
    if let Some(rest) = quote_prefix(line) {
        return Block::new(BlockKind::Quote, inline_runs(rest));
    }
    Block::new(BlockKind::Paragraph, inline_runs(line))
}

/// `#`, `##`, or `###` followed by whitespace. Four or more hashes are not a
/// heading here and fall through to paragraph.
fn heading_prefix(line: &str) -> Option<(usize, &str)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    rest.starts_with(char::is_whitespace)
        .then(|| (hashes, rest.trim_start()))
}

/// `-`, `*`, or `+` followed by whitespace.
fn bullet_prefix(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let marker = chars.next()?;
    if !matches!(marker, '-' | '*' | '+') {
        return None;
    }
    chars
        .next()
        .is_some_and(char::is_whitespace)
        .then(|| line[1..].trim_start())
}

/// A bullet whose content opens with a `[ ]` / `[x]` checkbox.
fn todo_prefix(rest: &str) -> Option<(bool, &str)> {
    for (marker, checked) in [("[ ]", false), ("[x]", true), ("[X]", true)] {
        if let Some(after) = rest.strip_prefix(marker) {
            if after.is_empty() || after.starts_with(char::is_whitespace) {
                return Some((checked, after.trim_start()));
            }
        }
    }
    None
}

/// A decimal number, `.`, then whitespace. The number itself is discarded;
/// the remote renderer regenerates list ordering.
fn numbered_prefix(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    rest.starts_with(char::is_whitespace)
        .then(|| rest.trim_start())
}

/// Three or more of the same `-`, `*`, or `_` character and nothing else.
fn is_divider(line: &str) -> bool {
    let mut chars = line.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    matches!(first, '-' | '*' | '_') && line.len() >= 3 && chars.all(|c| c == first)
}

/// `>` followed by whitespace.
fn quote_prefix(line: &str) -> Option<&str> {
    let rest = line.strip_prefix('>')?;
    rest.starts_with(char::is_whitespace)
        .then(|| rest.trim_start())
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

/// Attach an indented list item under the nearest preceding list-item chain,
/// rounding to the deepest level that actually exists (fail-open: a deeper
/// indent than the structure supports attaches at the available depth).
fn attach_list_item(blocks: &mut Vec<Block>, depth: usize, block: Block) {
    if depth > 0 {
        if let Some(parent) = blocks.last_mut() {
            if parent.kind.is_list_item() {
                return attach_list_item(&mut parent.children, depth - 1, block);
            }
        }
    }
    blocks.push(block);
}

/// Parse one line's content into inline runs via pulldown-cmark events.
///
/// Only bold, italic, and inline code are recognized; everything else the
/// parser produces (link text, HTML, escapes) passes through as text with
/// the emphasis currently in effect.
///
/// The parser sees the line as a tiny document, so content our classifier
/// did not claim can still open a CommonMark block construct (`#### x`,
/// `>no-space`). Those lines keep their raw text as a single literal run;
/// re-parsing them as blocks would silently drop the marker characters.
fn inline_runs(text: &str) -> Vec<TextRun> {
    let mut runs: Vec<TextRun> = Vec::new();
    let mut bold_depth: u32 = 0;
    let mut italic_depth: u32 = 0;

    fn in_effect(bold_depth: u32, italic_depth: u32, code: bool) -> Annotations {
        Annotations {
            bold: bold_depth > 0,
            italic: italic_depth > 0,
            code,
        }
    }

    for event in Parser::new(text) {
        match event {
            Event::Start(Tag::Heading { .. })
            | Event::Start(Tag::BlockQuote(_))
            | Event::Start(Tag::List(_))
            | Event::Start(Tag::CodeBlock(_))
            | Event::Rule => {
                return vec![TextRun::plain(text)];
            }
            Event::Start(Tag::Strong) => bold_depth += 1,
            Event::End(TagEnd::Strong) => bold_depth = bold_depth.saturating_sub(1),
            Event::Start(Tag::Emphasis) => italic_depth += 1,
            Event::End(TagEnd::Emphasis) => italic_depth = italic_depth.saturating_sub(1),
            Event::Text(cow) => push_run(
                &mut runs,
                cow.as_ref(),
                in_effect(bold_depth, italic_depth, false),
            ),
            Event::Code(cow) => push_run(
                &mut runs,
                cow.as_ref(),
                in_effect(bold_depth, italic_depth, true),
            ),
            Event::SoftBreak | Event::HardBreak => {
                push_run(&mut runs, " ", in_effect(bold_depth, italic_depth, false))
            }
            Event::Html(cow) | Event::InlineHtml(cow) => push_run(
                &mut runs,
                cow.as_ref(),
                in_effect(bold_depth, italic_depth, false),
            ),
            _ => {}
        }
    }

    if runs.is_empty() && !text.is_empty() {
        // The parser consumed everything without emitting text (bare HTML
        // comment, etc.), so keep the raw line rather than dropping it.
        runs.push(TextRun::plain(text));
    }
    runs
}

/// Append a run, merging with the previous one when the emphasis matches.
fn push_run(runs: &mut Vec<TextRun>, content: &str, annotations: Annotations) {
    if content.is_empty() {
        return;
    }
    if let Some(last) = runs.last_mut() {
        if last.annotations == annotations {
            last.content.push_str(content);
            return;
        }
    }
    runs.push(TextRun::styled(content, annotations));
}

// ── Render-back ──────────────────────────────────────────────────────────

/// Render blocks back to markdown text, the inverse of [`convert`] for the
/// supported subset. Used by the page read-back path.
pub fn render_markdown(blocks: &[Block]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for block in blocks {
        render_block(&mut lines, block, 0);
    }
    lines.join("\n")
}

fn render_block(lines: &mut Vec<String>, block: &Block, depth: usize) {
    let indent = "  ".repeat(depth);
    let text = inline_markdown(&block.rich_text);
    let line = match block.kind {
        BlockKind::Paragraph => text,
        BlockKind::Heading1 => format!("# {text}"),
        BlockKind::Heading2 => format!("## {text}"),
        BlockKind::Heading3 => format!("### {text}"),
        BlockKind::BulletedListItem => format!("- {text}"),
        // The displayed number was never preserved; the remote regenerates it.
        BlockKind::NumberedListItem => format!("1. {text}"),
        BlockKind::ToDo => {
            format!("- [{}] {text}", if block.checked { "x" } else { " " })
        }
        BlockKind::Quote => format!("> {text}"),
        BlockKind::Divider => "---".to_string(),
        BlockKind::Code => {
            let language = block.language.as_deref().unwrap_or("");
            let fence_lang = if language == "plain text" { "" } else { language };
            lines.push(format!("{indent}```{fence_lang}"));
            for body_line in block.plain_text().lines() {
                lines.push(body_line.to_string());
            }
            lines.push(format!("{indent}```"));
            for child in &block.children {
                render_block(lines, child, depth + 1);
            }
            return;
        }
    };
    lines.push(format!("{indent}{line}"));
    for child in &block.children {
        render_block(lines, child, depth + 1);
    }
}

/// Re-wrap a run sequence in emphasis markers.
fn inline_markdown(runs: &[TextRun]) -> String {
    let mut out = String::new();
    for run in runs {
        let mut piece = if run.annotations.code {
            format!("`{}`", run.content)
        } else {
            run.content.clone()
        };
        if run.annotations.italic {
            piece = format!("*{piece}*");
        }
        if run.annotations.bold {
            piece = format!("**{piece}**");
        }
        out.push_str(&piece);
    }
    out
}

// ── Tests ────────────────────────────────────────────────────────────────
