//! Read-only angular vector index.
//!
//! The index stores one vector per slot and answers nearest-neighbor queries
//! with angular distances in [0, 2]. Distances are returned raw; converting
//! them to similarities is the caller's job.
//!
//! # File format
//!
//! ```text
//! magic "PIDX" | version u32 | dimension u32 | count u64 |
//! count × dimension f32 | crc32 of the vector bytes u32
//! ```
//!
//! All integers and floats are little-endian.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PictorError, Result};
use crate::index::distance::{angular_distance, norm};

/// Magic bytes at the start of an index file.
pub const INDEX_MAGIC: &[u8; 4] = b"PIDX";

/// Current index file format version.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Bytes before the vector payload.
const HEADER_LEN: u64 = 4 + 4 + 4 + 8;

/// Below this many items distances are computed on the calling thread.
const PARALLEL_THRESHOLD: usize = 100;

/// One nearest-neighbor hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Index slot of the hit.
    pub slot: u32,
    /// Raw angular distance to the query.
    pub distance: f32,
}

impl Neighbor {
    fn cmp_by_distance(&self, other: &Neighbor) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.slot.cmp(&other.slot))
    }
}

/// A queryable nearest-neighbor index.
pub trait VectorIndex: Send + Sync + Debug {
    /// Return up to `k` neighbors of `vector`, ascending by distance.
    ///
    /// Fewer than `k` are returned when the index holds fewer items. Ties are
    /// ordered by slot.
    fn query_nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>>;

    /// Dimension of the stored vectors.
    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exhaustive angular index over a contiguous vector buffer.
#[derive(Debug, Clone)]
pub struct FlatAngularIndex {
    dimension: usize,
    vectors: Vec<f32>,
    norms: Vec<f32>,
}

impl FlatAngularIndex {
    /// Build an index from a row-major buffer of `dimension`-length vectors.
    pub fn from_vectors(dimension: usize, vectors: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            return Err(PictorError::invalid_argument("index dimension must be positive"));
        }
        if vectors.len() % dimension != 0 {
            return Err(PictorError::invalid_argument(format!(
                "vector buffer of length {} is not a multiple of dimension {dimension}",
                vectors.len()
            )));
        }
        if vectors.len() / dimension > u32::MAX as usize {
            return Err(PictorError::invalid_argument("too many vectors for u32 slots"));
        }

        let norms = vectors.chunks_exact(dimension).map(norm).collect();
        Ok(Self {
            dimension,
            vectors,
            norms,
        })
    }

    /// Load an index file written by [`save`](Self::save).
    ///
    /// Any problem with the file is reported as
    /// [`PictorError::IndexUnavailable`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PictorError::index_unavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        let file_len = file
            .metadata()
            .map_err(|e| PictorError::index_unavailable(format!("{}: {e}", path.display())))?
            .len();

        let mut reader = BufReader::new(file);
        let (dimension, count) = read_header(&mut reader)?;

        let payload_len = count
            .checked_mul(dimension as u64)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| PictorError::index_unavailable("index header overflows"))?;
        if HEADER_LEN + payload_len + 4 != file_len {
            return Err(PictorError::index_unavailable(format!(
                "{} is {file_len} bytes, header announces {}",
                path.display(),
                HEADER_LEN + payload_len + 4
            )));
        }

        read_payload(&mut reader, dimension, count)
    }

    /// Read an index from any byte stream.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let (dimension, count) = read_header(reader)?;
        read_payload(reader, dimension, count)
    }

    /// Write the index to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the index to any byte sink.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(INDEX_MAGIC)?;
        writer.write_u32::<LittleEndian>(INDEX_FORMAT_VERSION)?;
        writer.write_u32::<LittleEndian>(self.dimension as u32)?;
        writer.write_u64::<LittleEndian>(self.len() as u64)?;

        let mut bytes = vec![0u8; self.vectors.len() * 4];
        LittleEndian::write_f32_into(&self.vectors, &mut bytes);
        writer.write_all(&bytes)?;
        writer.write_u32::<LittleEndian>(crc32fast::hash(&bytes))?;
        Ok(())
    }

    /// The stored vector at `slot`.
    pub fn vector(&self, slot: u32) -> Option<&[f32]> {
        let start = slot as usize * self.dimension;
        self.vectors.get(start..start + self.dimension)
    }

    fn neighbor(&self, query: &[f32], query_norm: f32, slot: usize) -> Neighbor {
        let start = slot * self.dimension;
        let item = &self.vectors[start..start + self.dimension];
        Neighbor {
            slot: slot as u32,
            distance: angular_distance(query, query_norm, item, self.norms[slot]),
        }
    }
}

impl VectorIndex for FlatAngularIndex {
    fn query_nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if vector.len() != self.dimension {
            return Err(PictorError::invalid_argument(format!(
                "query dimension {} does not match index dimension {}",
                vector.len(),
                self.dimension
            )));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = norm(vector);
        let mut neighbors: Vec<Neighbor> = if self.len() < PARALLEL_THRESHOLD {
            (0..self.len())
                .map(|slot| self.neighbor(vector, query_norm, slot))
                .collect()
        } else {
            (0..self.len())
                .into_par_iter()
                .map(|slot| self.neighbor(vector, query_norm, slot))
                .collect()
        };

        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k, Neighbor::cmp_by_distance);
            neighbors.truncate(k);
        }
        neighbors.sort_by(Neighbor::cmp_by_distance);
        Ok(neighbors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.norms.len()
    }
}

fn read_header<R: Read>(reader: &mut R) -> Result<(usize, u64)> {
    let corrupt = |e: std::io::Error| PictorError::index_unavailable(format!("truncated index header: {e}"));

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(corrupt)?;
    if &magic != INDEX_MAGIC {
        return Err(PictorError::index_unavailable("not an index file (bad magic)"));
    }

    let version = reader.read_u32::<LittleEndian>().map_err(corrupt)?;
    if version != INDEX_FORMAT_VERSION {
        return Err(PictorError::index_unavailable(format!(
            "unsupported index format version {version}"
        )));
    }

    let dimension = reader.read_u32::<LittleEndian>().map_err(corrupt)? as usize;
    let count = reader.read_u64::<LittleEndian>().map_err(corrupt)?;
    if dimension == 0 {
        return Err(PictorError::index_unavailable("index dimension is zero"));
    }
    if count > u32::MAX as u64 {
        return Err(PictorError::index_unavailable(format!("item count {count} exceeds slot range")));
    }
    Ok((dimension, count))
}

fn read_payload<R: Read>(reader: &mut R, dimension: usize, count: u64) -> Result<FlatAngularIndex> {
    let len = (count as usize)
        .checked_mul(dimension)
        .ok_or_else(|| PictorError::index_unavailable("index header overflows"))?;
    let len_bytes = len
        .checked_mul(4)
        .ok_or_else(|| PictorError::index_unavailable("index header overflows"))?;

    // Allocation follows the bytes actually present, not the header.
    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(len_bytes as u64)
        .read_to_end(&mut bytes)
        .map_err(|e| PictorError::index_unavailable(format!("unreadable vector payload: {e}")))?;
    if bytes.len() != len_bytes {
        return Err(PictorError::index_unavailable(format!(
            "truncated vector payload: {} of {len_bytes} bytes",
            bytes.len()
        )));
    }
    let stored_crc = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| PictorError::index_unavailable(format!("missing checksum: {e}")))?;
    if crc32fast::hash(&bytes) != stored_crc {
        return Err(PictorError::index_unavailable("vector payload checksum mismatch"));
    }

    let mut vectors = vec![0f32; len];
    LittleEndian::read_f32_into(&bytes, &mut vectors);
    FlatAngularIndex::from_vectors(dimension, vectors)
        .map_err(|e| PictorError::index_unavailable(e.to_string()))
}

/// Accumulates vectors into a [`FlatAngularIndex`], assigning sequential slots.
#[derive(Debug, Clone)]
pub struct FlatIndexBuilder {
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatIndexBuilder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// Append a vector and return its slot.
    pub fn add_item(&mut self, vector: &[f32]) -> Result<u32> {
        if vector.len() != self.dimension {
            return Err(PictorError::invalid_argument(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                vector.len()
            )));
        }
        let slot = self.len();
        if slot >= u32::MAX as usize {
            return Err(PictorError::invalid_argument("index is full"));
        }
        self.vectors.extend_from_slice(vector);
        Ok(slot as u32)
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Finish building.
    pub fn build(self) -> Result<FlatAngularIndex> {
        FlatAngularIndex::from_vectors(self.dimension, self.vectors)
    }
}
