//! Overlapping fixed-size text chunking.
//!
//! Sizes are counted in characters, not bytes, and chunk boundaries always
//! fall on char boundaries. In separator mode a chunk ends right after the
//! highest-priority separator found in its window, and no boundary ever
//! lands strictly inside a separator token.

use crate::config::{ChunkMode, ChunkingConfig};
use crate::error::Result;

/// Splits text into overlapping chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
    mode: ChunkMode,
    separators: Vec<String>,
}

impl Chunker {
    /// Build a chunker. Invalid sizes are rejected here, not per call.
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.overlap,
            mode: config.mode,
            separators: config.separators.clone(),
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily iterate the chunks of `text`. Calling this again restarts the
    /// sequence from the beginning.
    pub fn chunks<'a>(&'a self, text: &'a str) -> Chunks<'a> {
        Chunks {
            chunker: self,
            text,
            start: 0,
            done: text.is_empty(),
        }
    }
}

/// Iterator over the chunks of one text.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    chunker: &'a Chunker,
    text: &'a str,
    /// Byte offset where the next chunk starts.
    start: usize,
    done: bool,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.done {
            return None;
        }

        let start = self.start;
        let window_end = start + char_offset(&self.text[start..], self.chunker.chunk_size);

        let end = if window_end >= self.text.len() {
            self.text.len()
        } else {
            match self.chunker.mode {
                ChunkMode::Characters => window_end,
                ChunkMode::Separators => self.separator_cut(start, window_end),
            }
        };

        if end >= self.text.len() {
            self.done = true;
        } else {
            self.start = self.next_start(start, end);
        }

        Some(&self.text[start..end])
    }
}

impl Chunks<'_> {
    /// Pick the end of a chunk starting at `start` whose hard limit is
    /// `window_end`.
    ///
    /// The cut must leave more than `overlap` characters in the chunk so the
    /// next chunk starts strictly later.
    fn separator_cut(&self, start: usize, window_end: usize) -> usize {
        let window = &self.text[start..window_end];
        let min_cut = start + char_offset(window, self.chunker.overlap + 1);

        for separator in &self.chunker.separators {
            let mut search_end = window_end;
            while let Some(index) = self.text[start..search_end].rfind(separator.as_str()) {
                let cut = start + index + separator.len();
                if cut < min_cut {
                    break;
                }
                if self.enclosing_separator(cut).is_none() {
                    return cut;
                }
                search_end = start + index;
            }
        }

        // No usable separator: hard cut. A token straddling the window edge
        // is left out when that still leaves a valid chunk, otherwise it is
        // taken in whole.
        match self.enclosing_separator(window_end) {
            Some((token_start, _)) if token_start >= min_cut => token_start,
            Some((_, token_end)) => token_end,
            None => window_end,
        }
    }

    /// Step back `overlap` characters from `end`. A position inside a
    /// separator token moves to the token start, or to its end when the
    /// start would not advance past `start`.
    fn next_start(&self, start: usize, end: usize) -> usize {
        let overlap = self.chunker.overlap;
        let candidate = if overlap == 0 {
            end
        } else {
            self.text[..end]
                .char_indices()
                .rev()
                .nth(overlap - 1)
                .map(|(index, _)| index)
                .unwrap_or(start)
        };

        match self.enclosing_separator(candidate) {
            Some((token_start, _)) if token_start > start => token_start,
            Some((_, token_end)) => token_end,
            None => candidate,
        }
    }

    /// Byte range of a separator occurrence that strictly contains byte
    /// `position`.
    fn enclosing_separator(&self, position: usize) -> Option<(usize, usize)> {
        if self.chunker.mode != ChunkMode::Separators {
            return None;
        }
        for separator in &self.chunker.separators {
            for back in 1..separator.len() {
                let Some(token_start) = position.checked_sub(back) else {
                    break;
                };
                if self.text.is_char_boundary(token_start)
                    && self.text[token_start..].starts_with(separator.as_str())
                {
                    return Some((token_start, token_start + separator.len()));
                }
            }
        }
        None
    }
}

/// Byte offset of the `count`-th character of `text`, or `text.len()` if it
/// has fewer characters.
fn char_offset(text: &str, count: usize) -> usize {
    text.char_indices()
        .nth(count)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}
