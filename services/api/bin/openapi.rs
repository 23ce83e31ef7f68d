//! Writes the Bubbly API's OpenAPI document to disk.
//!
//! Usage: `openapi [OUTPUT]` (defaults to `openapi.json`).

use anyhow::Context;
use bubbly_api::router::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    let doc = ApiDoc::openapi();
    let json = doc
        .to_pretty_json()
        .context("Failed to serialize the OpenAPI document")?;
    std::fs::write(&output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} paths to {}",
        doc.paths.paths.len(),
        output.display()
    );
    Ok(())
}
