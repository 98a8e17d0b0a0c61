//! Exact (flat) vector index stored in the FAISS `IndexFlat` file layout.
//!
//! All integers are little-endian:
//!
//! ```text
//! fourcc      [u8; 4]   "IxFI" (inner product) | "IxF2" (L2)
//! d           i32
//! ntotal      i64
//! dummy       i64 x 2   (always 1 << 20)
//! is_trained  u8
//! metric      i32       0 = inner product, 1 = L2
//! size        u64       number of f32 values that follow (d * ntotal)
//! data        f32 x size
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const FOURCC_INNER_PRODUCT: [u8; 4] = *b"IxFI";
const FOURCC_L2: [u8; 4] = *b"IxF2";
const HEADER_DUMMY: i64 = 1 << 20;
/// Bytes before the vector payload.
const HEADER_LEN: u64 = 4 + 4 + 8 + 8 + 8 + 1 + 4 + 8;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("unsupported index type {0:?} (only flat IxFI/IxF2 indexes can be read)")]
    UnsupportedIndex(String),
    #[error("unsupported metric type {0}")]
    UnsupportedMetric(i32),
    #[error("invalid index header: {0}")]
    InvalidHeader(String),
    #[error("vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("index payload truncated: expected {expected} bytes, file has {actual}")]
    Truncated { expected: u64, actual: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Larger is closer
    InnerProduct,
    /// Squared Euclidean distance, smaller is closer
    L2,
}

impl Metric {
    fn code(self) -> i32 {
        match self {
            Metric::InnerProduct => 0,
            Metric::L2 => 1,
        }
    }

    fn fourcc(self) -> [u8; 4] {
        match self {
            Metric::InnerProduct => FOURCC_INNER_PRODUCT,
            Metric::L2 => FOURCC_L2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::InnerProduct => "inner_product",
            Metric::L2 => "l2",
        }
    }
}

/// A search result: the position of the stored vector and its distance
/// (inner product or squared L2, depending on the metric).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    metric: Metric,
    vectors: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize, metric: Metric) -> Self {
        Self {
            dim,
            metric,
            vectors: Vec::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.vectors.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<(), IndexError> {
        self.check_dim(vector)?;
        self.vectors.extend_from_slice(vector);
        Ok(())
    }

    /// The stored vector at `position`.
    pub fn reconstruct(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.vectors.get(start..start + self.dim)
    }

    /// Exact k-nearest-neighbour search. Returns at most `min(k, len)`
    /// neighbours, closest first; ties keep ascending position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        self.check_dim(query)?;
        if self.dim == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Neighbor> = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, v)| Neighbor {
                position,
                distance: match self.metric {
                    Metric::InnerProduct => inner_product(query, v),
                    Metric::L2 => squared_l2(query, v),
                },
            })
            .collect();

        match self.metric {
            Metric::InnerProduct => scored.sort_by(|a, b| b.distance.total_cmp(&a.distance)),
            Metric::L2 => scored.sort_by(|a, b| a.distance.total_cmp(&b.distance)),
        }
        scored.truncate(k);
        Ok(scored)
    }

    pub fn read_from_path(path: &Path) -> Result<Self, IndexError> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let (dim, metric, count) = read_header(&mut reader)?;

        // Reject payload sizes the file cannot hold before allocating for them
        let expected = HEADER_LEN.saturating_add(count.saturating_mul(4));
        if file_len < expected {
            return Err(IndexError::Truncated {
                expected,
                actual: file_len,
            });
        }
        read_payload(&mut reader, dim, metric, count)
    }

    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, IndexError> {
        let (dim, metric, count) = read_header(reader)?;
        read_payload(reader, dim, metric, count)
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), IndexError> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), IndexError> {
        let dim = i32::try_from(self.dim)
            .map_err(|_| IndexError::InvalidHeader(format!("dimension {} too large", self.dim)))?;
        writer.write_all(&self.metric.fourcc())?;
        writer.write_all(&dim.to_le_bytes())?;
        writer.write_all(&(self.len() as i64).to_le_bytes())?;
        writer.write_all(&HEADER_DUMMY.to_le_bytes())?;
        writer.write_all(&HEADER_DUMMY.to_le_bytes())?;
        writer.write_all(&[1u8])?;
        writer.write_all(&self.metric.code().to_le_bytes())?;
        writer.write_all(&(self.vectors.len() as u64).to_le_bytes())?;
        for value in &self.vectors {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }

    fn check_dim(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dim {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Returns (dim, metric, float count).
fn read_header<R: Read>(reader: &mut R) -> Result<(usize, Metric, u64), IndexError> {
    let fourcc: [u8; 4] = read_array(reader)?;
    if fourcc != FOURCC_INNER_PRODUCT && fourcc != FOURCC_L2 {
        return Err(IndexError::UnsupportedIndex(
            String::from_utf8_lossy(&fourcc).into_owned(),
        ));
    }

    let dim = i32::from_le_bytes(read_array(reader)?);
    let ntotal = i64::from_le_bytes(read_array(reader)?);
    let _dummy: [u8; 16] = read_array(reader)?;
    let _is_trained: [u8; 1] = read_array(reader)?;
    let metric_code = i32::from_le_bytes(read_array(reader)?);

    let metric = match metric_code {
        0 => Metric::InnerProduct,
        1 => Metric::L2,
        other => return Err(IndexError::UnsupportedMetric(other)),
    };
    if fourcc != metric.fourcc() {
        tracing::warn!(
            "Index fourcc {:?} disagrees with metric type {}; using the metric type",
            String::from_utf8_lossy(&fourcc),
            metric_code
        );
    }

    if dim <= 0 {
        return Err(IndexError::InvalidHeader(format!("dimension {dim}")));
    }
    if ntotal < 0 {
        return Err(IndexError::InvalidHeader(format!("vector count {ntotal}")));
    }

    let count = u64::from_le_bytes(read_array(reader)?);
    let expected = (dim as u64).checked_mul(ntotal as u64);
    if expected != Some(count) {
        return Err(IndexError::InvalidHeader(format!(
            "payload holds {count} floats but header declares {ntotal} vectors of dimension {dim}"
        )));
    }

    Ok((dim as usize, metric, count))
}

fn read_payload<R: Read>(
    reader: &mut R,
    dim: usize,
    metric: Metric,
    count: u64,
) -> Result<FlatIndex, IndexError> {
    let byte_len = count
        .checked_mul(4)
        .ok_or_else(|| IndexError::InvalidHeader(format!("payload of {count} floats")))?;
    // No capacity hint: the header is untrusted, a short read is reported below
    let mut bytes = Vec::new();
    let read = reader.take(byte_len).read_to_end(&mut bytes)? as u64;
    if read < byte_len {
        return Err(IndexError::Truncated {
            expected: byte_len,
            actual: read,
        });
    }

    let vectors = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(FlatIndex {
        dim,
        metric,
        vectors,
    })
}

fn read_array<const N: usize, R: Read>(reader: &mut R) -> Result<[u8; N], IndexError> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            IndexError::InvalidHeader("file ends inside the header".to_string())
        } else {
            IndexError::Io(e)
        }
    })?;
    Ok(buf)
}

fn inner_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
