
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{RagError, Result};

/// Configuration for splitting extracted text into overlapping windows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window width in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive windows
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    /// Reject window parameters under which the splitter could never
    /// terminate or make progress.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                self.overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split text into ordered, overlapping character windows.
///
/// Windows are `chunk_size` characters wide and consecutive windows share
/// exactly `overlap` characters. Emission stops once a window reaches the end
/// of the text, so the final window may be shorter but always carries more
/// than `overlap` new characters. For `N` characters of input the result
/// holds `ceil(max(N - overlap, 0) / (chunk_size - overlap))` windows; empty
/// input yields no windows at all.
///
/// Identical inputs always produce a byte-identical sequence.
#[inline]
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;

    // Byte offsets of every char boundary, so windows are counted in
    // characters but sliced without ever splitting a multibyte char.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());
    let total_chars = boundaries.len() - 1;

    let mut chunks = Vec::new();
    if total_chars == 0 {
        return Ok(chunks);
    }

    let step = config.chunk_size - config.overlap;
    let mut start = 0;
    loop {
        let end = usize::min(start + config.chunk_size, total_chars);
        let window = text
            .get(boundaries[start]..boundaries[end])
            .expect("window offsets fall on char boundaries");
        chunks.push(window.to_string());

        if start + config.chunk_size >= total_chars {
            break;
        }
        start += step;
    }

    debug!(
        "Chunked {} chars into {} windows (size {}, overlap {})",
        total_chars,
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}
