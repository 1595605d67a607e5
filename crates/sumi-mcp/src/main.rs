//! sumi MCP server binary.
//!
//! Bridges markdown content from MCP clients into Notion pages.
//!
//! Usage:
//!   # NOTION_API_KEY and NOTION_PARENT_ID must be set in the environment
//!   cargo run -p sumi-mcp
//!
//!   # Override the default parent page
//!   cargo run -p sumi-mcp -- --parent <page-id>
//!
//! Test with MCP inspector:
//!   npx @modelcontextprotocol/inspector cargo run -p sumi-mcp

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use tracing_subscriber::{EnvFilter, fmt};

use sumi_mcp::SumiMcp;
use sumi_notion::{Config, NotionClient};

/// MCP server bridging markdown content into Notion pages.
#[derive(Parser, Debug)]
#[command(name = "sumi-mcp")]
#[command(about = "MCP server bridging markdown content into Notion pages")]
struct Args {
    /// Parent page id, overriding NOTION_PARENT_ID
    #[arg(long)]
    parent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing to stderr (MCP uses stdio for protocol)
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let args = Args::parse();

    // Missing credentials are fatal before we accept any connection
    let mut config = Config::from_env()?;
    if let Some(parent) = args.parent {
        config.parent_page_id = parent;
    }
    config.timeout = Duration::from_secs(args.timeout_secs);

    tracing::info!(parent = %config.parent_page_id, "Notion client configured");
    let client = NotionClient::new(config)?;

    let service = SumiMcp::new(client)
        .serve(stdio())
        .await
        .inspect_err(|e| {
            tracing::error!("MCP server error: {:?}", e);
        })?;

    tracing::info!("sumi-mcp server ready");

    service.waiting().await?;

    tracing::info!("sumi-mcp server shutting down");
    Ok(())
}
