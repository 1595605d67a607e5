//! HTTP client for the Notion REST API.
//!
//! One shared `reqwest::Client` with a bounded per-request timeout. Rate
//! limiting (HTTP 429) is handled here with a capped backoff honoring
//! `Retry-After`; everything else surfaces as a terminal [`NotionError`]
//! tagged with the originating operation. Request and response bodies use
//! Notion's JSON schema verbatim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode, header};
use serde_json::{Value, json};
use tracing::{debug, warn};

use sumi_blocks::Block;

use crate::api::{ChildrenPage, CreatedPage, DeleteStatus, PageApi, PageHit, RemoteChild};
use crate::config::Config;
use crate::error::{NotionError, Operation};

/// Hosted API base.
pub const NOTION_API_BASE: &str = "https://api.notion.com/v1";

/// Pinned API revision, the block schema this crate serializes.
const NOTION_VERSION: &str = "2022-06-28";

/// Largest page size the children endpoint accepts.
const LIST_PAGE_SIZE: usize = 100;

const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Notion REST client.
#[derive(Clone, Debug)]
pub struct NotionClient {
    http: reqwest::Client,
    config: Config,
}

impl NotionClient {
    pub fn new(config: Config) -> Result<Self, NotionError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| NotionError::Build { source })?;
        Ok(Self { http, config })
    }

    /// The configured default parent page.
    pub fn parent_page_id(&self) -> &str {
        &self.config.parent_page_id
    }

    /// Issue one API request, retrying only on 429.
    async fn request(
        &self,
        operation: Operation,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, NotionError> {
        let url = format!("{}{}", self.config.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(
                    header::AUTHORIZATION,
                    format!("Bearer {}", self.config.api_key),
                )
                .header("Notion-Version", NOTION_VERSION);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .await
                .map_err(|source| NotionError::Transport { operation, source })?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RATE_LIMIT_RETRIES {
                let delay = retry_after(&response).unwrap_or(DEFAULT_RETRY_AFTER);
                attempt += 1;
                warn!(
                    operation = operation.as_str(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                return Err(NotionError::Api {
                    operation,
                    status: status.as_u16(),
                    code: body
                        .get("code")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    message: body
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("no error message in response")
                        .to_string(),
                });
            }

            debug!(operation = operation.as_str(), status = status.as_u16(), "request ok");
            return response
                .json::<Value>()
                .await
                .map_err(|source| NotionError::Transport { operation, source });
        }
    }
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Pull a page title out of a page object. Title pages keep it under the
/// `title` property; database rows commonly use `Name`.
fn extract_title(page: &Value) -> String {
    for property in ["title", "Name"] {
        if let Some(text) = page
            .pointer(&format!("/properties/{property}/title/0/text/content"))
            .and_then(Value::as_str)
        {
            return text.to_string();
        }
        if let Some(text) = page
            .pointer(&format!("/properties/{property}/title/0/plain_text"))
            .and_then(Value::as_str)
        {
            return text.to_string();
        }
    }
    String::new()
}

fn page_hit(page: &Value) -> Option<PageHit> {
    Some(PageHit {
        page_id: page.get("id")?.as_str()?.to_string(),
        title: extract_title(page),
        url: page
            .get("url")
            .and_then(Value::as_str)
            .map(str::to_owned),
    })
}

#[async_trait]
impl PageApi for NotionClient {
    async fn create_page(
        &self,
        parent_id: &str,
        title: &str,
    ) -> Result<CreatedPage, NotionError> {
        let operation = Operation::CreatePage;
        let body = json!({
            "parent": { "type": "page_id", "page_id": parent_id },
            "properties": {
                "title": {
                    "title": [ { "text": { "content": title } } ]
                }
            },
        });
        let response = self
            .request(operation, Method::POST, "/pages", Some(&body))
            .await?;
        let page_id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| NotionError::Shape {
                operation,
                detail: "created page has no id".to_string(),
            })?
            .to_string();
        debug!(page = %page_id, title, "page created");
        Ok(CreatedPage {
            page_id,
            url: response
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<PageHit, NotionError> {
        let operation = Operation::RetrievePage;
        let response = self
            .request(operation, Method::GET, &format!("/pages/{page_id}"), None)
            .await?;
        page_hit(&response).ok_or_else(|| NotionError::Shape {
            operation,
            detail: "page object has no id".to_string(),
        })
    }

    async fn list_children(
        &self,
        page_id: &str,
        cursor: Option<&str>,
    ) -> Result<ChildrenPage, NotionError> {
        let operation = Operation::ListChildren;
        let mut path = format!("/blocks/{page_id}/children?page_size={LIST_PAGE_SIZE}");
        if let Some(cursor) = cursor {
            path.push_str(&format!("&start_cursor={cursor}"));
        }
        let response = self.request(operation, Method::GET, &path, None).await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| NotionError::Shape {
                operation,
                detail: "listing has no results array".to_string(),
            })?;
        let children = results
            .iter()
            .filter_map(|item| {
                Some(RemoteChild {
                    id: item.get("id")?.as_str()?.to_string(),
                    block: Block::from_json(item),
                })
            })
            .collect();

        let has_more = response
            .get("has_more")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let next_cursor = if has_more {
            response
                .get("next_cursor")
                .and_then(Value::as_str)
                .map(str::to_owned)
        } else {
            None
        };
        Ok(ChildrenPage {
            children,
            next_cursor,
        })
    }

    async fn append_children(
        &self,
        page_id: &str,
        blocks: &[Block],
    ) -> Result<Vec<String>, NotionError> {
        let operation = Operation::AppendChildren;
        let body = json!({
            "children": blocks.iter().map(Block::to_json).collect::<Vec<_>>(),
        });
        let response = self
            .request(
                operation,
                Method::PATCH,
                &format!("/blocks/{page_id}/children"),
                Some(&body),
            )
            .await?;
        let created = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| NotionError::Shape {
                operation,
                detail: "append response has no results array".to_string(),
            })?
            .iter()
            .filter_map(|item| item.get("id").and_then(Value::as_str))
            .map(str::to_owned)
            .collect();
        Ok(created)
    }

    async fn delete_block(&self, block_id: &str) -> Result<DeleteStatus, NotionError> {
        let operation = Operation::DeleteBlock;
        match self
            .request(
                operation,
                Method::DELETE,
                &format!("/blocks/{block_id}"),
                None,
            )
            .await
        {
            Ok(_) => Ok(DeleteStatus::Deleted),
            // Already archived or never existed: idempotent success
            Err(NotionError::Api { status, .. }) if status == 404 || status == 410 => {
                Ok(DeleteStatus::AlreadyGone)
            }
            Err(other) => Err(other),
        }
    }

    async fn search_pages(&self, query: &str) -> Result<Vec<PageHit>, NotionError> {
        let operation = Operation::Search;
        let body = json!({
            "query": query,
            "filter": { "property": "object", "value": "page" },
        });
        let response = self
            .request(operation, Method::POST, "/search", Some(&body))
            .await?;
        let results = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| NotionError::Shape {
                operation,
                detail: "search response has no results array".to_string(),
            })?;
        Ok(results.iter().filter_map(page_hit).collect())
    }
}
