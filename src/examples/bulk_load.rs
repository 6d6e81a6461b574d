//! Bulk Load Example
//!
//! Loads a batch of generated log lines into a search cluster:
//! - Client setup with failover across several nodes
//! - Bulk actions sent in size-bounded chunks
//! - Refresh and count once loading is done
//!
//! Run with: cargo run --example bulk_load -- http://localhost:9200 [more urls...]

use chrono::{Duration as ChronoDuration, NaiveDate};
use searchlink_rs::{BulkAction, ChunkLimits, Client, ClientConfig, QueryParams};
use serde_json::json;
use tracing_subscriber::EnvFilter;

const INDEX: &str = "demo-logs";
const DOC_TYPE: &str = "line";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let urls: Vec<String> = std::env::args().skip(1).collect();
    let config = if urls.is_empty() {
        ClientConfig::default()
    } else {
        ClientConfig::new(urls)
    }
    .with_max_retries(2);
    let client = Client::from_config(config)?;
    println!("Nodes: {:?}\n", client.endpoints().live);

    match client.create_index(INDEX, None, QueryParams::new()).await {
        Ok(_) => println!("Created index {INDEX}"),
        Err(e) if e.is_already_exists() => println!("Index {INDEX} already exists"),
        Err(e) => return Err(e.into()),
    }

    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("invalid start date"))?;
    let actions = (0..2_000).map(|n| {
        let at = start + ChronoDuration::seconds(n * 17);
        BulkAction::index(json!({
            "seq": n,
            "level": if n % 50 == 0 { "error" } else { "info" },
            "message": format!("request {n} handled"),
            "at": at.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }))
        .index_name(INDEX)
        .doc_type(DOC_TYPE)
        .id(n)
    });

    // At most 500 actions or 256 KiB per request
    let limits = ChunkLimits::records(500).with_max_bytes(256 * 1024);
    let responses = client
        .bulk_chunked(actions, limits, QueryParams::new())
        .await?;
    println!("Sent {} bulk requests", responses.len());

    client.refresh(&[INDEX], QueryParams::new()).await?;
    let errors = client
        .count("level:error", &[INDEX], &[DOC_TYPE], QueryParams::new())
        .await?;
    println!("Error lines indexed: {}", errors["count"]);

    let pool = client.endpoints();
    println!("\nLive nodes: {}, dead nodes: {}", pool.live.len(), pool.dead.len());

    Ok(())
}
