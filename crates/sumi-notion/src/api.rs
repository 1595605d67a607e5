//! Remote page API contract.
//!
//! [`PageApi`] is the seam between the synchronizer and the HTTP client:
//! the production implementation is [`crate::NotionClient`], tests drive the
//! synchronizer against an in-memory script. All calls are fallible with
//! [`NotionError`] and carry no retry semantics at this level.

use async_trait::async_trait;

use sumi_blocks::Block;

use crate::error::NotionError;

/// Result of creating a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedPage {
    pub page_id: String,
    pub url: Option<String>,
}

/// A page surfaced by search or retrieval.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageHit {
    pub page_id: String,
    pub title: String,
    pub url: Option<String>,
}

/// One existing child block of a page. `block` is the parsed form when the
/// remote type is one we support, `None` otherwise. The id is always
/// present and is what deletion needs.
#[derive(Clone, Debug)]
pub struct RemoteChild {
    pub id: String,
    pub block: Option<Block>,
}

/// One page of a children listing. A `next_cursor` means more pages follow;
/// its absence terminates the sequence.
#[derive(Clone, Debug, Default)]
pub struct ChildrenPage {
    pub children: Vec<RemoteChild>,
    pub next_cursor: Option<String>,
}

/// Outcome of a delete call. Deleting a block that is already gone is not
/// an error; the synchronizer treats both as success.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    AlreadyGone,
}

/// Thin interface over the hosted page service.
#[async_trait]
pub trait PageApi: Send + Sync {
    /// Create an empty page titled `title` under `parent_id`.
    async fn create_page(&self, parent_id: &str, title: &str)
        -> Result<CreatedPage, NotionError>;

    /// Fetch a page's title and URL.
    async fn retrieve_page(&self, page_id: &str) -> Result<PageHit, NotionError>;

    /// Fetch one page of the block children of `page_id`, starting at
    /// `cursor` (None for the first page).
    async fn list_children(
        &self,
        page_id: &str,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, NotionError>;

    /// Append blocks after the page's current children. Returns the created
    /// block ids in order.
    async fn append_children(
        &self,
        page_id: &str,
        blocks: &[Block],
    ) -> Result<Vec<String>, NotionError>;

    /// Delete (archive) a single block.
    async fn delete_block(&self, block_id: &str) -> Result<DeleteStatus, NotionError>;

    /// Search pages by text query, most relevant first.
    async fn search_pages(&self, query: &str) -> Result<Vec<PageHit>, NotionError>;
}
