//! Parsing, lookup, and response-shaping helpers for the MCP tools.

use serde_json::json;

use sumi_notion::{NotionError, PageApi, PageHit, SyncError, SyncMode};

/// Parse a sync mode argument ("replace" / "append", case-insensitive).
pub fn parse_mode(s: &str) -> Option<SyncMode> {
    SyncMode::from_str(s)
}

/// Find a page whose title matches exactly (case-insensitive), using the
/// remote search as a candidate source.
pub async fn find_page_by_title<C: PageApi + ?Sized>(
    api: &C,
    title: &str,
) -> Result<Option<PageHit>, NotionError> {
    let wanted = title.to_lowercase();
    let hits = api.search_pages(title).await?;
    Ok(hits.into_iter().find(|hit| hit.title.to_lowercase() == wanted))
}

/// Public page URL derived from the id, for responses where the API did not
/// return one.
pub fn page_url(page_id: &str) -> String {
    format!("https://notion.so/{}", page_id.replace('-', ""))
}

/// Failure payload for a sync error: the message plus the remote side
/// effects that already committed before the failure point.
pub fn sync_failure(err: &SyncError) -> String {
    json!({
        "error": err.to_string(),
        "created_block_ids": err.created_block_ids(),
        "deleted_block_ids": err.deleted_block_ids(),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use sumi_blocks::Block;
    use sumi_notion::{ChildrenPage, CreatedPage, DeleteStatus, Operation};

    use super::*;

    /// Search-only fake: every other operation answers with an empty value.
    struct SearchApi {
        hits: Vec<PageHit>,
    }

    #[async_trait]
    impl PageApi for SearchApi {
        async fn create_page(
            &self,
            _parent_id: &str,
            _title: &str,
        ) -> Result<CreatedPage, NotionError> {
            Ok(CreatedPage {
                page_id: String::new(),
                url: None,
            })
        }

        async fn retrieve_page(&self, _page_id: &str) -> Result<PageHit, NotionError> {
            Ok(PageHit::default())
        }

        async fn list_children(
            &self,
            _page_id: &str,
            _cursor: Option<&str>,
        ) -> Result<ChildrenPage, NotionError> {
            Ok(ChildrenPage::default())
        }

        async fn append_children(
            &self,
            _page_id: &str,
            _blocks: &[Block],
        ) -> Result<Vec<String>, NotionError> {
            Ok(Vec::new())
        }

        async fn delete_block(&self, _block_id: &str) -> Result<DeleteStatus, NotionError> {
            Ok(DeleteStatus::Deleted)
        }

        async fn search_pages(&self, _query: &str) -> Result<Vec<PageHit>, NotionError> {
            Ok(self.hits.clone())
        }
    }

    fn hit(id: &str, title: &str) -> PageHit {
        PageHit {
            page_id: id.to_string(),
            title: title.to_string(),
            url: None,
        }
    }

    #[tokio::test]
    async fn title_match_is_exact_but_case_insensitive() {
        let api = SearchApi {
            hits: vec![
                hit("p1", "Weekly Report Draft"),
                hit("p2", "Weekly Report"),
            ],
        };

        let found = find_page_by_title(&api, "weekly report")
            .await
            .expect("search ok");
        assert_eq!(found.map(|h| h.page_id), Some("p2".to_string()));

        let missing = find_page_by_title(&api, "weekly")
            .await
            .expect("search ok");
        assert!(missing.is_none());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(parse_mode("replace"), Some(SyncMode::Replace));
        assert_eq!(parse_mode("Append"), Some(SyncMode::Append));
        assert_eq!(parse_mode("overwrite"), None);
    }

    #[test]
    fn page_url_strips_dashes() {
        assert_eq!(
            page_url("a1b2-c3d4-e5f6"),
            "https://notion.so/a1b2c3d4e5f6"
        );
    }

    #[test]
    fn sync_failure_reports_partial_side_effects() {
        let err = SyncError::Append {
            batch_index: 1,
            batch_count: 3,
            created_block_ids: vec!["x".to_string()],
            deleted_block_ids: vec!["y".to_string()],
            source: NotionError::Api {
                operation: Operation::AppendChildren,
                status: 500,
                code: None,
                message: "boom".to_string(),
            },
        };
        let payload: serde_json::Value =
            serde_json::from_str(&sync_failure(&err)).expect("valid json");
        assert_eq!(payload["created_block_ids"][0], "x");
        assert_eq!(payload["deleted_block_ids"][0], "y");
        assert!(payload["error"].as_str().unwrap().contains("batch 1"));
    }
}
