//! MCP request types.
//!
//! These types define the API of the bridge's MCP tools.

use rmcp::schemars;
use serde::Deserialize;

/// Create a new page and fill it with converted markdown content.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreatePageRequest {
    /// Title of the new page
    #[schemars(description = "Title of the new page")]
    pub title: String,
    /// Markdown content for the page body
    #[schemars(description = "Markdown content for the page body")]
    pub content: String,
    /// Parent page ID (omit for the configured default parent)
    #[schemars(description = "Parent page ID (omit for the configured default parent)")]
    pub parent_id: Option<String>,
}

/// Write content to the page with a given title, creating it when missing.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct WritePageRequest {
    /// Title of the page to write to
    #[schemars(description = "Title of the page to write to (matched case-insensitively)")]
    pub title: String,
    /// Markdown content to write
    #[schemars(description = "Markdown content to write")]
    pub content: String,
    /// Parent page ID used when the page has to be created
    #[schemars(description = "Parent page ID used when the page has to be created")]
    pub parent_id: Option<String>,
    /// Reconciliation mode
    #[schemars(
        description = "'replace' to overwrite existing content, 'append' to add after it (default: replace)"
    )]
    #[serde(default = "default_mode")]
    pub mode: String,
}

fn default_mode() -> String {
    "replace".to_string()
}

/// Append content to the page with a given title, creating it when missing.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AppendPageRequest {
    /// Title of the page to append to
    #[schemars(description = "Title of the page to append to (matched case-insensitively)")]
    pub title: String,
    /// Markdown content to append
    #[schemars(description = "Markdown content to append after the existing content")]
    pub content: String,
    /// Parent page ID used when the page has to be created
    #[schemars(description = "Parent page ID used when the page has to be created")]
    pub parent_id: Option<String>,
}

/// Search pages by text query.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchPagesRequest {
    /// Text to search page titles for
    #[schemars(description = "Text to search page titles for")]
    pub query: String,
}

/// Read a page's content back as markdown.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReadPageRequest {
    /// Page ID to read
    #[schemars(description = "Page ID to read")]
    pub page_id: String,
}
