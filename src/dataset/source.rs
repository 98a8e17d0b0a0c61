use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dataset::download::download_file;

const INDEX_CACHE_NAME: &str = "index.faiss";
const METADATA_CACHE_NAME: &str = "metadata.json";

/// Where the vector index and its record array live.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSource {
    /// Files already on local disk
    Local {
        index_path: PathBuf,
        metadata_path: PathBuf,
    },
    /// Files in blob storage, downloaded once into `cache_dir`
    Remote {
        index_url: String,
        metadata_url: String,
        cache_dir: PathBuf,
    },
}

/// Local paths of a dataset ready to be opened.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetFiles {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
}

impl DatasetSource {
    pub fn kind(&self) -> &'static str {
        match self {
            DatasetSource::Local { .. } => "local",
            DatasetSource::Remote { .. } => "remote",
        }
    }

    /// Make both files available on local disk, downloading remote files
    /// that are not in the cache yet.
    pub async fn materialize(
        &self,
        client: &reqwest::Client,
        download_timeout: Duration,
    ) -> Result<DatasetFiles> {
        match self {
            DatasetSource::Local {
                index_path,
                metadata_path,
            } => {
                if !index_path.exists() {
                    anyhow::bail!("Vector index file not found: {}", index_path.display());
                }
                if !metadata_path.exists() {
                    anyhow::bail!("Metadata file not found: {}", metadata_path.display());
                }
                Ok(DatasetFiles {
                    index_path: index_path.clone(),
                    metadata_path: metadata_path.clone(),
                })
            }
            DatasetSource::Remote {
                index_url,
                metadata_url,
                cache_dir,
            } => {
                tokio::fs::create_dir_all(cache_dir).await?;
                let (index_path, metadata_path) = cache_paths(cache_dir, index_url, metadata_url);

                fetch_if_missing(client, index_url, &index_path, "vector index", download_timeout)
                    .await?;
                fetch_if_missing(client, metadata_url, &metadata_path, "metadata", download_timeout)
                    .await?;

                Ok(DatasetFiles {
                    index_path,
                    metadata_path,
                })
            }
        }
    }
}

async fn fetch_if_missing(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    what: &str,
    timeout: Duration,
) -> Result<()> {
    if dest.exists() {
        tracing::info!("Using cached {what} at {}", dest.display());
        return Ok(());
    }
    tracing::info!("Downloading {what} from blob storage...");
    download_file(client, url, dest, timeout).await?;
    Ok(())
}

/// Cache locations of the index and metadata blobs. URLs ending in the same
/// segment fall back to fixed names so one never shadows the other.
fn cache_paths(cache_dir: &Path, index_url: &str, metadata_url: &str) -> (PathBuf, PathBuf) {
    let index_path = cache_path(cache_dir, index_url, INDEX_CACHE_NAME);
    let metadata_path = cache_path(cache_dir, metadata_url, METADATA_CACHE_NAME);
    if index_path == metadata_path {
        return (
            cache_dir.join(INDEX_CACHE_NAME),
            cache_dir.join(METADATA_CACHE_NAME),
        );
    }
    (index_path, metadata_path)
}

/// Cache file name: the last path segment of the URL (query string dropped),
/// or `fallback` when the URL has none.
fn cache_path(cache_dir: &Path, url: &str, fallback: &str) -> PathBuf {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty() && *s != ".." && *s != ".")
        .unwrap_or(fallback);
    cache_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_path_uses_last_segment() {
        let p = cache_path(
            Path::new("/tmp"),
            "https://acct.blob.core.windows.net/public/ultra_index.faiss?sv=2024&sig=abc",
            "index.faiss",
        );
        assert_eq!(p, PathBuf::from("/tmp/ultra_index.faiss"));
    }

    #[test]
    fn test_cache_path_falls_back_for_bare_urls() {
        let p = cache_path(Path::new("/tmp"), "https://blob.example/", "metadata.json");
        assert_eq!(p, PathBuf::from("/tmp/metadata.json"));
    }

    #[test]
    fn test_colliding_url_names_use_distinct_cache_files() {
        let (index, metadata) = cache_paths(
            Path::new("/tmp"),
            "https://blob.example/a/data",
            "https://blob.example/b/data?sig=1",
        );
        assert_eq!(index, PathBuf::from("/tmp/index.faiss"));
        assert_eq!(metadata, PathBuf::from("/tmp/metadata.json"));
        assert_ne!(index, metadata);
    }

    #[tokio::test]
    async fn test_missing_local_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let source = DatasetSource::Local {
            index_path: dir.path().join("missing.faiss"),
            metadata_path: dir.path().join("missing.json"),
        };
        let err = source
            .materialize(&reqwest::Client::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Vector index file not found"));
    }

    #[tokio::test]
    async fn test_cached_remote_files_are_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("grid.faiss"), b"cached").unwrap();
        std::fs::write(dir.path().join("grid.json"), b"[]").unwrap();

        // Unroutable URLs: any download attempt would fail
        let source = DatasetSource::Remote {
            index_url: "http://127.0.0.1:9/grid.faiss".to_string(),
            metadata_url: "http://127.0.0.1:9/grid.json".to_string(),
            cache_dir: dir.path().to_path_buf(),
        };
        let files = source
            .materialize(&reqwest::Client::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(files.index_path, dir.path().join("grid.faiss"));
        assert_eq!(files.metadata_path, dir.path().join("grid.json"));
    }
}
