use std::collections::VecDeque;

use super::types::{Chunk, Document};
use crate::error::IndexError;

/// Separator levels tried in order: paragraph, line, sentence, word.
/// A segment containing none of them falls through to single characters.
const SEPARATOR_LEVELS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];
const CHAR_LEVEL: usize = SEPARATOR_LEVELS.len();

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitterConfig {
    /// Upper bound on chunk length, in characters.
    pub chunk_size: usize,
    /// Upper bound on characters shared by consecutive chunks.
    pub chunk_overlap: usize,
    pub trim_whitespace: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 400,
            trim_whitespace: true,
        }
    }
}

impl SplitterConfig {
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidConfig`] if `chunk_size` is zero or the overlap is not
    /// smaller than the chunk size.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.chunk_size == 0 {
            return Err(IndexError::InvalidConfig(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IndexError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Byte range of a chunk inside its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Recursive separator-aware splitter.
///
/// Text is cut at the coarsest boundary present (paragraph, then line, sentence, word,
/// character); pieces that fit are merged greedily up to `chunk_size` characters, keeping up
/// to `chunk_overlap` trailing characters of one chunk at the head of the next. Pieces that do
/// not fit are split again at the next finer level.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid (see [`SplitterConfig::validate`]).
    pub fn new(config: SplitterConfig) -> Result<Self, IndexError> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, span)| Chunk {
                content: document.content[span.start..span.end].to_owned(),
                metadata: document.metadata.clone(),
                chunk_index,
                start: span.start,
                end: span.end,
            })
            .collect()
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<Span> {
        let mut out = Vec::new();
        if !text.is_empty() {
            self.split_segment(text, 0, text.len(), 0, &mut out);
        }
        out
    }

    fn split_segment(
        &self,
        text: &str,
        start: usize,
        end: usize,
        min_level: usize,
        out: &mut Vec<Span>,
    ) {
        let segment = &text[start..end];
        let level = (min_level..CHAR_LEVEL)
            .find(|&lvl| SEPARATOR_LEVELS[lvl].iter().any(|sep| segment.contains(sep)))
            .unwrap_or(CHAR_LEVEL);

        let pieces = if level == CHAR_LEVEL {
            segment
                .char_indices()
                .map(|(i, c)| Span {
                    start: start + i,
                    end: start + i + c.len_utf8(),
                })
                .collect()
        } else {
            split_keeping_separators(segment, start, SEPARATOR_LEVELS[level])
        };

        let mut fitting = Vec::new();
        for piece in pieces {
            let len = char_len(text, piece);
            if len < self.config.chunk_size {
                fitting.push((piece, len));
                continue;
            }
            self.merge(text, &fitting, out);
            fitting.clear();
            if level == CHAR_LEVEL {
                self.emit(text, piece, out);
            } else {
                self.split_segment(text, piece.start, piece.end, level + 1, out);
            }
        }
        self.merge(text, &fitting, out);
    }

    fn merge(&self, text: &str, pieces: &[(Span, usize)], out: &mut Vec<Span>) {
        let SplitterConfig {
            chunk_size,
            chunk_overlap,
            ..
        } = self.config;
        let mut window: VecDeque<(Span, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &(piece, len) in pieces {
            if total + len > chunk_size {
                if let (Some(first), Some(last)) = (window.front(), window.back()) {
                    self.emit(
                        text,
                        Span {
                            start: first.0.start,
                            end: last.0.end,
                        },
                        out,
                    );
                }
                while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }

        if let (Some(first), Some(last)) = (window.front(), window.back()) {
            self.emit(
                text,
                Span {
                    start: first.0.start,
                    end: last.0.end,
                },
                out,
            );
        }
    }

    fn emit(&self, text: &str, span: Span, out: &mut Vec<Span>) {
        let span = if self.config.trim_whitespace {
            let raw = &text[span.start..span.end];
            let leading = raw.len() - raw.trim_start().len();
            let trailing = raw.len() - raw.trim_end().len();
            if leading == raw.len() {
                return;
            }
            Span {
                start: span.start + leading,
                end: span.end - trailing,
            }
        } else {
            span
        };
        if span.start < span.end {
            out.push(span);
        }
    }
}

/// Split after every occurrence of any separator; the separator stays with the left piece.
fn split_keeping_separators(segment: &str, offset: usize, separators: &[&str]) -> Vec<Span> {
    let bytes = segment.as_bytes();
    let mut pieces = Vec::new();
    let mut piece_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match separators
            .iter()
            .find(|sep| bytes[i..].starts_with(sep.as_bytes()))
        {
            Some(sep) => {
                i += sep.len();
                pieces.push(Span {
                    start: offset + piece_start,
                    end: offset + i,
                });
                piece_start = i;
            }
            None => i += 1,
        }
    }
    if piece_start < bytes.len() {
        pieces.push(Span {
            start: offset + piece_start,
            end: offset + bytes.len(),
        });
    }
    pieces
}

fn char_len(text: &str, span: Span) -> usize {
    text[span.start..span.end].chars().count()
}
