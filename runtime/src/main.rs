//! `silta` - sidecar delta xDS proxy
//!
//! Configured entirely through `SILTA_*` environment variables.

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    silta_runtime::run().await
}
