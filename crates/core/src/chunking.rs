use crate::error::IngestError;
use crate::models::{Chunk, Document};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const DEFAULT_CHUNK_SIZE: usize = 1_500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk overlap ({}) must be less than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Split points, from most to least preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
    Character,
}

const BOUNDARIES: [Boundary; 5] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
    Boundary::Character,
];

/// Recursive character splitter.
///
/// Text is cut at the most preferred boundary that occurs in it, and any piece
/// still longer than the chunk size is cut again at the next boundary down.
/// Small pieces are then merged back into windows of at most `chunk_size`
/// characters, carrying at most `chunk_overlap` characters of the previous
/// window into the next one. Separators stay attached to the start of the
/// piece that follows them, so merged chunks are verbatim slices of the input
/// (modulo trimming).
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
    sentence_end: Regex,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        config.validate()?;
        Ok(Self {
            config,
            sentence_end: Regex::new(r"[.!?][ \t]+")?,
        })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        self.split_recursive(text, &BOUNDARIES)
            .into_iter()
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    fn split_recursive(&self, text: &str, boundaries: &[Boundary]) -> Vec<String> {
        let position = boundaries
            .iter()
            .position(|boundary| self.occurs_in(*boundary, text))
            .unwrap_or(boundaries.len().saturating_sub(1));

        let Some(boundary) = boundaries.get(position).copied() else {
            return vec![text.trim().to_string()];
        };
        let remaining = &boundaries[position + 1..];

        let mut output = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in self.split_at(boundary, text) {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                output.extend(self.merge(&pending));
                pending.clear();
            }

            if remaining.is_empty() {
                output.push(piece.trim().to_string());
            } else {
                output.extend(self.split_recursive(piece, remaining));
            }
        }

        if !pending.is_empty() {
            output.extend(self.merge(&pending));
        }

        output
    }

    fn occurs_in(&self, boundary: Boundary, text: &str) -> bool {
        match boundary {
            Boundary::Paragraph => text.contains("\n\n"),
            Boundary::Line => text.contains('\n'),
            Boundary::Sentence => self.sentence_end.is_match(text),
            Boundary::Word => text.contains(' '),
            Boundary::Character => true,
        }
    }

    fn split_at<'a>(&self, boundary: Boundary, text: &'a str) -> Vec<&'a str> {
        match boundary {
            Boundary::Paragraph => split_before(text, text.match_indices("\n\n").map(|(at, _)| at)),
            Boundary::Line => split_before(text, text.match_indices('\n').map(|(at, _)| at)),
            // Terminal punctuation stays with its sentence.
            Boundary::Sentence => split_before(
                text,
                self.sentence_end.find_iter(text).map(|found| found.start() + 1),
            ),
            Boundary::Word => split_before(text, text.match_indices(' ').map(|(at, _)| at)),
            Boundary::Character => split_before(text, text.char_indices().map(|(at, _)| at)),
        }
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces.iter().copied() {
            let len = char_len(piece);

            if total + len > size && !window.is_empty() {
                push_trimmed(&mut chunks, &window);

                while total > overlap || (total + len > size && total > 0) {
                    match window.pop_front() {
                        Some(first) => total -= char_len(first),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        push_trimmed(&mut chunks, &window);
        chunks
    }
}

fn split_before(text: &str, offsets: impl Iterator<Item = usize>) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;

    for offset in offsets {
        if offset > start {
            pieces.push(&text[start..offset]);
            start = offset;
        }
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined = window.iter().copied().collect::<String>();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Collapses runs of horizontal whitespace and excess blank lines while
/// keeping paragraph and line breaks intact for the splitter.
pub fn normalize_whitespace(text: &str) -> String {
    let lines = text
        .replace('\u{a0}', " ")
        .replace("\r\n", "\n")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>();

    let mut normalized = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        normalized.push_str(&line);
        normalized.push('\n');
    }

    normalized.trim().to_string()
}

/// Splits one document, numbering chunk ids from `cursor` so ids stay unique
/// across a whole build. Returns the chunks and the next free cursor value.
pub fn build_chunks(
    document: &Document,
    splitter: &TextSplitter,
    cursor: u64,
) -> (Vec<Chunk>, u64) {
    let mut next = cursor;
    let chunks = splitter
        .split_text(&document.raw_text)
        .into_iter()
        .enumerate()
        .map(|(position, text)| {
            let chunk = Chunk {
                chunk_id: format!("doc_{}_chunk_{}", document.filename, next),
                text,
                source_document: document.filename.clone(),
                position_index: position as u64,
            };
            next = next.saturating_add(1);
            chunk
        })
        .collect();

    (chunks, next)
}
