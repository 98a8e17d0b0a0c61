use anyhow::{Context, Result};
use futures_util::stream::{Stream, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const MIB: u64 = 1024 * 1024;
/// Progress is logged each time another 5 MiB has been written.
const PROGRESS_STEP: u64 = 5 * MIB;

/// Download `url` to `dest`. The body is streamed into `dest.part` and
/// renamed into place only once complete, so an interrupted download never
/// leaves a file that looks cached.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    timeout: Duration,
) -> Result<u64> {
    tracing::info!("Downloading {url}...");

    let resp = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("Failed to request {url}"))?;

    if !resp.status().is_success() {
        anyhow::bail!("Failed to download {url}: HTTP {}", resp.status().as_u16());
    }

    let announced = resp.content_length();
    if let Some(len) = announced {
        tracing::info!("File size: {:.2} MB", len as f64 / MIB as f64);
    }

    let part_path = part_path(dest);
    let written = match write_stream(resp.bytes_stream(), &part_path, announced).await {
        Ok(n) => n,
        Err(e) => {
            let _ = tokio::fs::remove_file(&part_path).await;
            return Err(e.context(format!("Failed to download {url}")));
        }
    };

    tokio::fs::rename(&part_path, dest)
        .await
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;

    tracing::info!("Downloaded to {}", dest.display());
    Ok(written)
}

/// Write a byte stream to `path`, returning the number of bytes written.
pub async fn write_stream<S, E>(stream: S, path: &Path, announced: Option<u64>) -> Result<u64>
where
    S: Stream<Item = std::result::Result<bytes::Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut stream = Box::pin(stream);
    let mut downloaded = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Stream read error")?;
        file.write_all(&chunk).await?;

        let before = downloaded;
        downloaded += chunk.len() as u64;
        if downloaded / PROGRESS_STEP > before / PROGRESS_STEP {
            match announced {
                Some(total) if total > 0 => tracing::info!(
                    "Progress: {:.1}% ({:.1}MB)",
                    downloaded as f64 / total as f64 * 100.0,
                    downloaded as f64 / MIB as f64
                ),
                _ => tracing::info!("Progress: {:.1}MB", downloaded as f64 / MIB as f64),
            }
        }
    }

    file.flush().await?;
    Ok(downloaded)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
