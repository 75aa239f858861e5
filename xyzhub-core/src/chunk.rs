//! Partitioning of feature sequences into upload-sized chunks.

use std::{fmt, num::NonZeroUsize};

/// Number of features sent in one upload request.
///
/// The wrapped value is never zero, which keeps [`chunkify`] total.
///
/// # Examples
/// ```
/// use xyzhub_core::ChunkSize;
///
/// assert_eq!(ChunkSize::default().get(), 200);
/// assert!(ChunkSize::new(0).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkSize(NonZeroUsize);

impl ChunkSize {
    /// Chunk size used when none is configured.
    pub const DEFAULT: Self = Self(NonZeroUsize::MIN.saturating_add(199));

    /// Build a chunk size, returning `None` for zero.
    #[must_use]
    pub const fn new(size: usize) -> Option<Self> {
        match NonZeroUsize::new(size) {
            Some(size) => Some(Self(size)),
            None => None,
        }
    }

    /// The chunk size as a plain integer.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<NonZeroUsize> for ChunkSize {
    fn from(size: NonZeroUsize) -> Self {
        Self(size)
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Split `items` into consecutive chunks of at most `size` elements.
///
/// Order is preserved; only the final chunk may be shorter than `size`.
///
/// # Examples
/// ```
/// use xyzhub_core::{ChunkSize, chunkify};
///
/// let size = ChunkSize::new(2).expect("non-zero");
/// let chunks = chunkify(vec![1, 2, 3, 4, 5], size);
/// assert_eq!(chunks, vec![vec![1, 2], vec![3, 4], vec![5]]);
/// ```
#[must_use]
pub fn chunkify<T>(items: Vec<T>, size: ChunkSize) -> Vec<Vec<T>> {
    let limit = size.get();
    let mut chunks: Vec<Vec<T>> = Vec::new();
    for item in items {
        match chunks.last_mut() {
            Some(current) if current.len() < limit => current.push(item),
            _ => {
                let mut fresh = Vec::with_capacity(limit);
                fresh.push(item);
                chunks.push(fresh);
            }
        }
    }
    chunks
}
