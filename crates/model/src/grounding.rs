use serde::{Deserialize, Serialize};

/// Source metadata attached to a search-grounded response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundingMetadata {
    /// The sources the model consulted, referenced by index from
    /// [`GroundingSupport::chunk_indices`].
    pub chunks: Vec<GroundingChunk>,
    /// Text segments of the response and the sources backing them.
    pub supports: Vec<GroundingSupport>,
}

impl GroundingMetadata {
    /// Returns `true` if there is nothing to cite.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty() && self.supports.is_empty()
    }

    /// Merges metadata received in a later part of a streamed response.
    ///
    /// Chunk indices of `other` are shifted so they keep pointing at the
    /// same chunks.
    pub fn extend(&mut self, other: GroundingMetadata) {
        let offset = self.chunks.len();
        self.chunks.extend(other.chunks);
        self.supports.extend(other.supports.into_iter().map(|mut support| {
            for idx in &mut support.chunk_indices {
                *idx += offset;
            }
            support
        }));
    }
}

/// A raw source reference returned by a search-grounded generation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundingChunk {
    /// A resolvable URL of the source, if any.
    pub uri: Option<String>,
    /// A display title, usually the domain of the source.
    pub title: Option<String>,
}

/// Ties a segment of the response text to the sources supporting it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundingSupport {
    /// Byte offset where the segment starts.
    pub start_index: usize,
    /// Byte offset where the segment ends (exclusive).
    pub end_index: usize,
    /// Indices into [`GroundingMetadata::chunks`].
    pub chunk_indices: Vec<usize>,
}
