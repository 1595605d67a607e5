//! Notion REST client and page content synchronizer.
//!
//! `NotionClient` is a thin HTTP-backed implementation of the [`PageApi`]
//! trait; [`PageSync`] orchestrates markdown conversion, request batching,
//! and ordered remote calls against any `PageApi` implementation.

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod sync;

pub use api::{ChildrenPage, CreatedPage, DeleteStatus, PageApi, PageHit, RemoteChild};
pub use client::{NOTION_API_BASE, NotionClient};
pub use config::{Config, ConfigError, ENV_API_KEY, ENV_PARENT_ID};
pub use error::{NotionError, Operation};
pub use sync::{PageSync, SyncError, SyncMode, SyncPlan, SyncReport};
