//! Character-window chunking with overlap.

use crate::error::ConfigError;
use crate::models::{Chunk, ChunkMode, Document, IndexingConfig};

/// Splits documents into overlapping windows of at most `chunk_size` characters.
///
/// Offsets count Unicode scalar values, never bytes, so multi-byte text is
/// never split inside a character.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
    mode: ChunkMode,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize, mode: ChunkMode) -> Result<Self, ConfigError> {
        if chunk_size == 0 || overlap == 0 {
            return Err(ConfigError::ValidationError(
                "chunk_size and overlap must be positive".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
            mode,
        })
    }

    pub fn from_config(config: &IndexingConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.chunk_size as usize,
            config.chunk_overlap as usize,
            config.chunk_mode,
        )
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split a document into ordered chunks.
    ///
    /// Whitespace-only text yields no chunks; text no longer than
    /// `chunk_size` yields exactly one chunk holding the trimmed text.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.windows(document.text.trim())
            .into_iter()
            .enumerate()
            .map(|(idx, text)| Chunk::from_document(document, text, idx as u32))
            .collect()
    }

    fn windows(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        if total == 0 {
            return Vec::new();
        }
        if total <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut windows = Vec::new();
        let mut start = 0;

        loop {
            let target_end = (start + self.chunk_size).min(total);
            let end = match self.mode {
                ChunkMode::Positional => target_end,
                ChunkMode::SentenceAware => self.find_break_point(&chars, start, target_end),
            };

            windows.push(chars[start..end].iter().collect());

            if end >= total {
                break;
            }
            start = end - self.overlap;
        }

        windows
    }

    /// Pull `target_end` back to a natural boundary inside the last 20% of
    /// the window. The result always leaves room for forward progress.
    fn find_break_point(&self, chars: &[char], start: usize, target_end: usize) -> usize {
        if target_end >= chars.len() {
            return chars.len();
        }

        let min_end = start + self.overlap + 1;
        let search_start = target_end.saturating_sub(self.chunk_size / 5).max(min_end);
        if search_start >= target_end {
            return target_end;
        }

        let mut paragraph = None;
        let mut newline = None;
        let mut sentence = None;
        let mut space = None;

        for pos in search_start..target_end {
            match chars[pos] {
                '\n' => {
                    if pos > 0 && chars[pos - 1] == '\n' {
                        paragraph = Some(pos + 1);
                    }
                    newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos + 1).is_some_and(|c| c.is_whitespace()) {
                        sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => space = Some(pos + 1),
                _ => {}
            }
        }

        paragraph
            .or(newline)
            .or(sentence)
            .or(space)
            .unwrap_or(target_end)
    }
}
