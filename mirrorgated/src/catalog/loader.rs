use std::path::Path;
use anyhow::{Context, Result};
use shared::types::ServiceDefinition;
use super::Catalog;

/// Load the catalog from an http(s) URL or a local file
pub async fn load(client: &reqwest::Client, source: &str) -> Result<Catalog> {
    let body = if is_remote(source) {
        fetch(client, source).await?
    } else {
        read_file(source).await?
    };

    let definitions = parse(&body)
        .with_context(|| format!("Failed to parse catalog from {}", source))?;

    Ok(Catalog::new(definitions))
}

/// Decode a catalog document: a JSON array of service definitions
pub fn parse(body: &[u8]) -> Result<Vec<ServiceDefinition>> {
    serde_json::from_slice(body).context("Catalog is not a valid service list")
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to fetch catalog from {}", url))?
        .error_for_status()
        .with_context(|| format!("Catalog request to {} failed", url))?;

    let body = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read catalog body from {}", url))?;

    Ok(body.to_vec())
}

async fn read_file(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))
}
