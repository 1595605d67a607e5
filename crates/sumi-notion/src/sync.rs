//! Page content synchronization.
//!
//! [`PageSync`] reconciles converted markdown against a page's existing
//! block children under two policies:
//!
//! ```text
//! +-------+   replace    +----------+           +-----------+
//! | Start | -----------> | Deleting | --------> | Appending |
//! +-------+              +----------+           +-----------+
//!     |                   (reverse-fetched           |
//!     |  append            order, already-           v
//!     +-------------------- deleted ok) ------> Done / Failed
//! ```
//!
//! Replace fetches the full child listing (following continuation cursors
//! to exhaustion) and deletes before anything is inserted, so a partial
//! failure never leaves two replace generations interleaved. Batches are
//! submitted strictly sequentially because the remote appends at the
//! current tail, so concurrent submission would race on ordering.
//!
//! Every failure carries the ids of the side effects that already
//! committed. No retries happen at this layer; the client owns backoff.

use std::str::FromStr;

use strum::EnumString;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use sumi_blocks::{Block, ConvertOptions, Limits, SizeError, chunk, convert};

use crate::api::{DeleteStatus, PageApi};
use crate::error::NotionError;

/// Reconciliation policy for existing page content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum SyncMode {
    /// Insert new blocks after the existing children.
    Append,
    /// Delete all existing children, then insert.
    #[default]
    Replace,
}

impl SyncMode {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Append => "append",
            SyncMode::Replace => "replace",
        }
    }
}

/// Intermediate artifact of one sync call: what exists remotely and what
/// will be sent. Built fresh per call, discarded after execution.
#[derive(Clone, Debug)]
pub struct SyncPlan {
    pub mode: SyncMode,
    /// Existing child ids in fetched order (replace mode only).
    pub existing_children: Vec<String>,
    /// Ordered, size-legal request batches.
    pub batches: Vec<Vec<Block>>,
}

/// Successful sync outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created_block_ids: Vec<String>,
    pub deleted_block_ids: Vec<String>,
    pub batches_sent: usize,
}

/// Sync failure. Every variant reports the remote side effects that had
/// already committed when the call stopped.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The document cannot be made to fit the limits. Raised before any
    /// remote call.
    #[error("document cannot satisfy size limits: {0}")]
    Size(#[from] SizeError),

    /// Listing existing children failed; nothing was mutated.
    #[error("listing existing children failed: {source}")]
    List {
        #[source]
        source: NotionError,
    },

    /// A delete failed. Remaining deletes and all appends were abandoned.
    #[error("delete failed after removing {} of {total} children: {source}", .deleted_block_ids.len())]
    Delete {
        deleted_block_ids: Vec<String>,
        total: usize,
        #[source]
        source: NotionError,
    },

    /// A batch append failed. Earlier batches are already on the page.
    #[error("append failed at batch {batch_index} of {batch_count}: {source}")]
    Append {
        batch_index: usize,
        batch_count: usize,
        created_block_ids: Vec<String>,
        deleted_block_ids: Vec<String>,
        #[source]
        source: NotionError,
    },

    /// Cancelled between remote calls. A batch is the atomic unit: work in
    /// flight when cancellation was requested still completed.
    #[error("cancelled after {} deletes and {} created blocks", .deleted_block_ids.len(), .created_block_ids.len())]
    Cancelled {
        created_block_ids: Vec<String>,
        deleted_block_ids: Vec<String>,
    },
}

impl SyncError {
    /// Ids of blocks created before the failure point.
    pub fn created_block_ids(&self) -> &[String] {
        match self {
            SyncError::Append {
                created_block_ids, ..
            }
            | SyncError::Cancelled {
                created_block_ids, ..
            } => created_block_ids,
            _ => &[],
        }
    }

    /// Ids of blocks deleted before the failure point.
    pub fn deleted_block_ids(&self) -> &[String] {
        match self {
            SyncError::Delete {
                deleted_block_ids, ..
            }
            | SyncError::Append {
                deleted_block_ids, ..
            }
            | SyncError::Cancelled {
                deleted_block_ids, ..
            } => deleted_block_ids,
            _ => &[],
        }
    }
}

/// Orchestrates conversion, chunking, and ordered remote calls for one
/// page. Holds no cross-call state; independent syncs against different
/// pages may run concurrently. Serializing concurrent syncs against the
/// same page is the caller's responsibility.
pub struct PageSync<'a, C: PageApi + ?Sized> {
    api: &'a C,
    options: ConvertOptions,
    limits: Limits,
    cancel: CancellationToken,
}

impl<'a, C: PageApi + ?Sized> PageSync<'a, C> {
    pub fn new(api: &'a C) -> Self {
        Self {
            api,
            options: ConvertOptions::default(),
            limits: Limits::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Token observed between remote calls; cancelling it stops the sync at
    /// the next batch boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Convert, chunk, and (for replace) read the existing children.
    /// Fails fast on size violations before any remote call is issued.
    pub async fn plan(
        &self,
        page_id: &str,
        text: &str,
        mode: SyncMode,
    ) -> Result<SyncPlan, SyncError> {
        let document = convert(text, &self.options);
        let batches = chunk(&document, &self.limits)?;

        let existing_children = match mode {
            SyncMode::Append => Vec::new(),
            SyncMode::Replace => self
                .collect_children(page_id)
                .await
                .map_err(|source| SyncError::List { source })?,
        };

        debug!(
            page = page_id,
            mode = mode.as_str(),
            blocks = document.block_count(),
            batches = batches.len(),
            existing = existing_children.len(),
            "sync plan built"
        );
        Ok(SyncPlan {
            mode,
            existing_children,
            batches,
        })
    }

    /// Drive a plan to completion: delete phase (replace only), then
    /// strictly sequential batch appends.
    pub async fn execute(&self, page_id: &str, plan: SyncPlan) -> Result<SyncReport, SyncError> {
        let total = plan.existing_children.len();
        let mut deleted: Vec<String> = Vec::new();

        // Deleting: reverse-fetched order, so the page never shows a stale
        // prefix under a fresh suffix if the caller retries after a failure.
        for block_id in plan.existing_children.iter().rev() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled {
                    created_block_ids: Vec::new(),
                    deleted_block_ids: deleted,
                });
            }
            match self.api.delete_block(block_id).await {
                Ok(DeleteStatus::Deleted) => deleted.push(block_id.clone()),
                Ok(DeleteStatus::AlreadyGone) => {
                    warn!(block = %block_id, "child was already deleted");
                    deleted.push(block_id.clone());
                }
                Err(source) => {
                    return Err(SyncError::Delete {
                        deleted_block_ids: deleted,
                        total,
                        source,
                    });
                }
            }
        }

        // Appending: one batch at a time, in order; the remote appends at
        // the current tail, so batches must never be submitted concurrently.
        let batch_count = plan.batches.len();
        let mut created: Vec<String> = Vec::new();
        for (batch_index, batch) in plan.batches.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(SyncError::Cancelled {
                    created_block_ids: created,
                    deleted_block_ids: deleted,
                });
            }
            match self.api.append_children(page_id, batch).await {
                Ok(ids) => {
                    debug!(
                        page = page_id,
                        batch = batch_index,
                        blocks = batch.len(),
                        "batch appended"
                    );
                    created.extend(ids);
                }
                Err(source) => {
                    return Err(SyncError::Append {
                        batch_index,
                        batch_count,
                        created_block_ids: created,
                        deleted_block_ids: deleted,
                        source,
                    });
                }
            }
        }

        info!(
            page = page_id,
            mode = plan.mode.as_str(),
            created = created.len(),
            deleted = deleted.len(),
            batches = batch_count,
            "sync complete"
        );
        Ok(SyncReport {
            created_block_ids: created,
            deleted_block_ids: deleted,
            batches_sent: batch_count,
        })
    }

    /// Convert `text` and reconcile it onto the page under `mode`.
    pub async fn sync(
        &self,
        page_id: &str,
        text: &str,
        mode: SyncMode,
    ) -> Result<SyncReport, SyncError> {
        let plan = self.plan(page_id, text, mode).await?;
        self.execute(page_id, plan).await
    }

    /// Follow continuation cursors until the listing is exhausted.
    async fn collect_children(&self, page_id: &str) -> Result<Vec<String>, NotionError> {
        let mut ids: Vec<String> = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.api.list_children(page_id, cursor.as_deref()).await?;
            ids.extend(page.children.into_iter().map(|child| child.id));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(ids)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use sumi_blocks::Limits;

    use super::*;
    use crate::api::{ChildrenPage, CreatedPage, PageHit, RemoteChild};
    use crate::error::Operation;

    fn api_error(operation: Operation) -> NotionError {
        NotionError::Api {
            operation,
            status: 500,
            code: None,
            message: "scripted failure".to_string(),
        }
    }

    /// Scripted in-memory stand-in for the remote service. Records every
    /// call and fails on cue.
    #[derive(Default)]
    struct ScriptedApi {
        /// Pages of the child listing, served in order.
        child_pages: Vec<ChildrenPage>,
        /// Fail the nth delete call (0-based).
        fail_delete_at: Option<usize>,
        /// Fail the nth append call (0-based).
        fail_append_at: Option<usize>,
        /// Cancel this token inside the first append call.
        cancel_during_first_append: Mutex<Option<CancellationToken>>,
        calls: Mutex<Vec<String>>,
        list_calls: Mutex<usize>,
        delete_calls: Mutex<usize>,
        append_calls: Mutex<usize>,
    }

    impl ScriptedApi {
        fn with_children(ids: &[&str]) -> Self {
            Self {
                child_pages: vec![ChildrenPage {
                    children: ids
                        .iter()
                        .map(|id| RemoteChild {
                            id: id.to_string(),
                            block: None,
                        })
                        .collect(),
                    next_cursor: None,
                }],
                ..Self::default()
            }
        }

        fn log(&self) -> Vec<String> {
            self.calls.lock().expect("calls mutex").clone()
        }

        fn cancel_on_first_append(&self, token: CancellationToken) {
            *self
                .cancel_during_first_append
                .lock()
                .expect("cancel mutex") = Some(token);
        }

        fn record(&self, entry: String) {
            self.calls.lock().expect("calls mutex").push(entry);
        }
    }

    #[async_trait]
    impl PageApi for ScriptedApi {
        async fn create_page(
            &self,
            _parent_id: &str,
            title: &str,
        ) -> Result<CreatedPage, NotionError> {
            self.record(format!("create:{title}"));
            Ok(CreatedPage {
                page_id: "new-page".to_string(),
                url: None,
            })
        }

        async fn retrieve_page(&self, page_id: &str) -> Result<PageHit, NotionError> {
            self.record(format!("retrieve:{page_id}"));
            Ok(PageHit {
                page_id: page_id.to_string(),
                title: String::new(),
                url: None,
            })
        }

        async fn list_children(
            &self,
            _page_id: &str,
            cursor: Option<&str>,
        ) -> Result<ChildrenPage, NotionError> {
            let mut count = self.list_calls.lock().expect("list mutex");
            let index = *count;
            *count += 1;
            self.record(format!("list:{}", cursor.unwrap_or("start")));
            Ok(self.child_pages.get(index).cloned().unwrap_or_default())
        }

        async fn append_children(
            &self,
            _page_id: &str,
            blocks: &[Block],
        ) -> Result<Vec<String>, NotionError> {
            let mut count = self.append_calls.lock().expect("append mutex");
            let index = *count;
            *count += 1;
            self.record(format!("append:batch{index}:{}", blocks.len()));
            if self.fail_append_at == Some(index) {
                return Err(api_error(Operation::AppendChildren));
            }
            if index == 0 {
                if let Some(token) = self
                    .cancel_during_first_append
                    .lock()
                    .expect("cancel mutex")
                    .as_ref()
                {
                    token.cancel();
                }
            }
            Ok((0..blocks.len())
                .map(|i| format!("created-{index}-{i}"))
                .collect())
        }

        async fn delete_block(&self, block_id: &str) -> Result<DeleteStatus, NotionError> {
            let mut count = self.delete_calls.lock().expect("delete mutex");
            let index = *count;
            *count += 1;
            self.record(format!("delete:{block_id}"));
            if self.fail_delete_at == Some(index) {
                return Err(api_error(Operation::DeleteBlock));
            }
            if block_id.starts_with("gone") {
                return Ok(DeleteStatus::AlreadyGone);
            }
            Ok(DeleteStatus::Deleted)
        }

        async fn search_pages(&self, query: &str) -> Result<Vec<PageHit>, NotionError> {
            self.record(format!("search:{query}"));
            Ok(Vec::new())
        }
    }

    fn tight_limits() -> Limits {
        Limits {
            max_blocks_per_request: 2,
            max_text_len_per_block: 2000,
        }
    }

    // =========================================================================
    // Replace mode
    // =========================================================================

    #[tokio::test]
    async fn replace_deletes_all_then_appends() {
        let api = ScriptedApi::with_children(&["a", "b", "c"]);
        let sync = PageSync::new(&api);

        let report = sync
            .sync("page", "hello", SyncMode::Replace)
            .await
            .expect("sync");

        // Deleted in reverse-fetched order
        assert_eq!(report.deleted_block_ids, vec!["c", "b", "a"]);
        assert_eq!(report.created_block_ids, vec!["created-0-0"]);
        assert_eq!(report.batches_sent, 1);
        assert_eq!(
            api.log(),
            vec!["list:start", "delete:c", "delete:b", "delete:a", "append:batch0:1"]
        );
    }

    #[tokio::test]
    async fn delete_failure_aborts_before_any_append() {
        let mut api = ScriptedApi::with_children(&["a", "b", "c"]);
        api.fail_delete_at = Some(1);
        let sync = PageSync::new(&api);

        let err = sync
            .sync("page", "hello", SyncMode::Replace)
            .await
            .expect_err("delete fails");

        match &err {
            SyncError::Delete {
                deleted_block_ids,
                total,
                source,
            } => {
                // Reverse order: "c" deleted first, failure on "b"
                assert_eq!(deleted_block_ids, &vec!["c".to_string()]);
                assert_eq!(*total, 3);
                assert_eq!(source.operation(), Some(Operation::DeleteBlock));
            }
            other => panic!("expected Delete error, got {other:?}"),
        }
        assert!(err.created_block_ids().is_empty());
        assert!(!api.log().iter().any(|c| c.starts_with("append")));
    }

    #[tokio::test]
    async fn already_deleted_children_are_tolerated() {
        let api = ScriptedApi::with_children(&["a", "gone-1", "b"]);
        let sync = PageSync::new(&api);

        let report = sync
            .sync("page", "hello", SyncMode::Replace)
            .await
            .expect("sync");
        assert_eq!(report.deleted_block_ids, vec!["b", "gone-1", "a"]);
    }

    #[tokio::test]
    async fn replace_follows_pagination_to_exhaustion() {
        let api = ScriptedApi {
            child_pages: vec![
                ChildrenPage {
                    children: vec![
                        RemoteChild {
                            id: "a".to_string(),
                            block: None,
                        },
                        RemoteChild {
                            id: "b".to_string(),
                            block: None,
                        },
                    ],
                    next_cursor: Some("cursor-1".to_string()),
                },
                ChildrenPage {
                    children: vec![RemoteChild {
                        id: "c".to_string(),
                        block: None,
                    }],
                    next_cursor: None,
                },
            ],
            ..ScriptedApi::default()
        };
        let sync = PageSync::new(&api);

        let plan = sync
            .plan("page", "hello", SyncMode::Replace)
            .await
            .expect("plan");
        assert_eq!(plan.existing_children, vec!["a", "b", "c"]);
        assert!(api.log().contains(&"list:cursor-1".to_string()));
    }

    // =========================================================================
    // Append mode
    // =========================================================================

    #[tokio::test]
    async fn append_mode_never_reads_or_deletes() {
        let api = ScriptedApi::with_children(&["a"]);
        let sync = PageSync::new(&api);

        let report = sync
            .sync("page", "one\ntwo", SyncMode::Append)
            .await
            .expect("sync");

        assert!(report.deleted_block_ids.is_empty());
        assert_eq!(report.created_block_ids.len(), 2);
        assert_eq!(api.log(), vec!["append:batch0:2"]);
    }

    #[tokio::test]
    async fn batches_submit_sequentially_in_order() {
        let api = ScriptedApi::default();
        let sync = PageSync::new(&api).with_limits(tight_limits());

        // Five paragraphs, two per batch
        let report = sync
            .sync("page", "p1\np2\np3\np4\np5", SyncMode::Append)
            .await
            .expect("sync");

        assert_eq!(report.batches_sent, 3);
        assert_eq!(
            api.log(),
            vec!["append:batch0:2", "append:batch1:2", "append:batch2:1"]
        );
    }

    #[tokio::test]
    async fn append_failure_reports_batch_index_and_partial_ids() {
        let mut api = ScriptedApi::default();
        api.fail_append_at = Some(1);
        let sync = PageSync::new(&api).with_limits(tight_limits());

        let err = sync
            .sync("page", "p1\np2\np3\np4\np5", SyncMode::Append)
            .await
            .expect_err("append fails");

        match &err {
            SyncError::Append {
                batch_index,
                batch_count,
                created_block_ids,
                ..
            } => {
                assert_eq!(*batch_index, 1);
                assert_eq!(*batch_count, 3);
                assert_eq!(
                    created_block_ids,
                    &vec!["created-0-0".to_string(), "created-0-1".to_string()]
                );
            }
            other => panic!("expected Append error, got {other:?}"),
        }
        // No third batch after the failure
        assert_eq!(api.log().iter().filter(|c| c.starts_with("append")).count(), 2);
    }

    // =========================================================================
    // Fail-fast and cancellation
    // =========================================================================

    #[tokio::test]
    async fn size_violation_fails_before_any_remote_call() {
        let api = ScriptedApi::with_children(&["a"]);
        let sync = PageSync::new(&api).with_limits(Limits {
            max_blocks_per_request: 0,
            max_text_len_per_block: 2000,
        });

        let err = sync
            .sync("page", "hello", SyncMode::Replace)
            .await
            .expect_err("size violation");
        assert!(matches!(err, SyncError::Size(SizeError::ZeroBlockLimit)));
        assert!(api.log().is_empty());
    }

    #[tokio::test]
    async fn cancellation_before_execution_reports_no_work() {
        let api = ScriptedApi::with_children(&["a", "b"]);
        let sync = PageSync::new(&api);
        sync.cancellation_token().cancel();

        let err = sync
            .sync("page", "hello", SyncMode::Replace)
            .await
            .expect_err("cancelled");
        match err {
            SyncError::Cancelled {
                created_block_ids,
                deleted_block_ids,
            } => {
                assert!(created_block_ids.is_empty());
                assert!(deleted_block_ids.is_empty());
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert!(!api.log().iter().any(|c| c.starts_with("delete")));
    }

    #[tokio::test]
    async fn cancellation_between_batches_keeps_completed_work() {
        let api = ScriptedApi::default();
        let sync = PageSync::new(&api).with_limits(tight_limits());
        api.cancel_on_first_append(sync.cancellation_token());

        let err = sync
            .sync("page", "p1\np2\np3\np4", SyncMode::Append)
            .await
            .expect_err("cancelled mid-run");

        match &err {
            SyncError::Cancelled {
                created_block_ids, ..
            } => {
                // Batch 0 completed; batch 1 never started
                assert_eq!(created_block_ids.len(), 2);
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert_eq!(api.log().iter().filter(|c| c.starts_with("append")).count(), 1);
    }

    // =========================================================================
    // Planning
    // =========================================================================

    #[tokio::test]
    async fn append_plan_skips_child_listing() {
        let api = ScriptedApi::with_children(&["a"]);
        let sync = PageSync::new(&api);

        let plan = sync
            .plan("page", "hello", SyncMode::Append)
            .await
            .expect("plan");
        assert!(plan.existing_children.is_empty());
        assert!(api.log().is_empty());
    }

    #[tokio::test]
    async fn empty_text_produces_no_batches() {
        let api = ScriptedApi::default();
        let sync = PageSync::new(&api);

        let report = sync
            .sync("page", "", SyncMode::Append)
            .await
            .expect("sync");
        assert_eq!(report.batches_sent, 0);
        assert!(report.created_block_ids.is_empty());
        assert!(api.log().is_empty());
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!(SyncMode::from_str("replace"), Some(SyncMode::Replace));
        assert_eq!(SyncMode::from_str("APPEND"), Some(SyncMode::Append));
        assert_eq!(SyncMode::from_str("merge"), None);
        assert_eq!(SyncMode::default(), SyncMode::Replace);
    }
}
