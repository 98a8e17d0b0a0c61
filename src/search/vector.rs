use anyhow::{Context, Result};
use std::path::Path;

use crate::models::{Document, RetrievedDocument};
use crate::search::flat::{FlatIndex, Metric};

/// A vector index paired with the records it was built from.
/// Vector `i` belongs to `documents[i]`.
#[derive(Debug)]
pub struct DocumentIndex {
    index: FlatIndex,
    documents: Vec<Document>,
}

impl DocumentIndex {
    pub fn new(index: FlatIndex, documents: Vec<Document>) -> Self {
        if index.len() != documents.len() {
            tracing::warn!(
                "Index holds {} vectors but metadata has {} records; unmatched positions are skipped",
                index.len(),
                documents.len()
            );
        }
        Self { index, documents }
    }

    /// Read the index file and the JSON record array from disk.
    pub fn load(index_path: &Path, metadata_path: &Path) -> Result<Self> {
        let index = FlatIndex::read_from_path(index_path)
            .with_context(|| format!("Failed to read vector index {}", index_path.display()))?;

        let file = std::fs::File::open(metadata_path)
            .with_context(|| format!("Failed to open metadata {}", metadata_path.display()))?;
        let documents: Vec<Document> = serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("Failed to parse metadata {}", metadata_path.display()))?;

        Ok(Self::new(index, documents))
    }

    /// Nearest documents to `query_embedding`, closest first. Never returns
    /// more than `limit` documents.
    pub fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<RetrievedDocument>> {
        let neighbors = self
            .index
            .search(query_embedding, limit)
            .context("Vector search failed")?;

        Ok(neighbors
            .into_iter()
            .filter_map(|n| {
                let doc = self.documents.get(n.position)?;
                Some(RetrievedDocument {
                    position: n.position,
                    id: doc.id.clone(),
                    content: doc.content.clone(),
                    distance: n.distance,
                })
            })
            .collect())
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn vector_count(&self) -> usize {
        self.index.len()
    }

    pub fn dimension(&self) -> usize {
        self.index.dim()
    }

    pub fn metric(&self) -> Metric {
        self.index.metric()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            content: content.to_string(),
        }
    }

    fn sample_index() -> FlatIndex {
        let mut index = FlatIndex::new(3, Metric::InnerProduct);
        index.add(&[0.1, 0.2, 0.9]).unwrap();
        index.add(&[0.9, 0.1, 0.1]).unwrap();
        index.add(&[0.2, 0.8, 0.3]).unwrap();
        index
    }

    #[test]
    fn test_search_maps_positions_to_records() {
        let docs = vec![
            doc("line-1", "138kV line, Ohio"),
            doc("line-2", "765kV interstate line"),
            doc("line-3", "115kV feeder"),
        ];
        let index = DocumentIndex::new(sample_index(), docs);
        let results = index.search(&[0.95, 0.05, 0.05], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "line-2");
        assert_eq!(results[0].position, 1);
        assert_eq!(results[0].content, "765kV interstate line");
    }

    #[test]
    fn test_positions_without_records_are_skipped() {
        // Three vectors, only two records
        let docs = vec![doc("a", "first"), doc("b", "second")];
        let index = DocumentIndex::new(sample_index(), docs);
        let results = index.search(&[0.0, 0.0, 1.0], 3).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.position < 2));
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let index = DocumentIndex::new(sample_index(), vec![]);
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("grid.faiss");
        let metadata_path = dir.path().join("grid.json");
        sample_index().write_to_path(&index_path).unwrap();
        std::fs::write(
            &metadata_path,
            r#"[{"id": 1, "content": "a"}, {"id": 2, "content": "b"}, {"id": 3, "content": "c"}]"#,
        )
        .unwrap();

        let index = DocumentIndex::load(&index_path, &metadata_path).unwrap();
        assert_eq!(index.document_count(), 3);
        assert_eq!(index.vector_count(), 3);
        assert_eq!(index.dimension(), 3);
    }

    #[test]
    fn test_load_reports_bad_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("grid.faiss");
        let metadata_path = dir.path().join("grid.json");
        sample_index().write_to_path(&index_path).unwrap();
        std::fs::write(&metadata_path, "{not json").unwrap();

        let err = DocumentIndex::load(&index_path, &metadata_path).err().unwrap();
        assert!(format!("{err:#}").contains("Failed to parse metadata"));
    }
}
