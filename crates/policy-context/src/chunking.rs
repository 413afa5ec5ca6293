//! Recursive character chunking with overlap.
//!
//! Text is split on the highest-priority separator that occurs in it, pieces
//! that are still too long are split again with the next separator, and the
//! resulting small pieces are merged back into windows of at most
//! `chunk_size` characters. Consecutive windows share up to `overlap`
//! characters. Lengths are counted in `char`s.

use std::collections::VecDeque;

use policy_core::{Chunk, Document, Error, Result};

/// Target chunk size in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared between consecutive chunks.
pub const CHUNK_OVERLAP: usize = 200;
/// Separators in order of preference; the empty separator hard-splits.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Chunker parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    chunk_size: usize,
    overlap: usize,
}

impl ChunkerConfig {
    /// Creates a configuration.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if `chunk_size` is zero or `overlap` is not smaller than it.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".to_owned()));
        }
        if overlap >= chunk_size {
            return Err(Error::Config(format!(
                "chunk overlap {overlap} must be smaller than chunk size {chunk_size}"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters carried over between chunks.
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            overlap: CHUNK_OVERLAP,
        }
    }
}

/// Splits document text into overlapping windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a chunker with the given configuration
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    pub fn config(&self) -> ChunkerConfig {
        self.config
    }

    /// Splits `text` into chunk strings. Empty or blank input yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut atoms = Vec::new();
        self.split_recursive(text, &SEPARATORS, "", &mut atoms);
        self.merge(&atoms)
    }

    /// Splits a document into indexed chunks.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunk(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk::new(document.source.clone(), index, text))
            .collect()
    }

    fn split_recursive<'text>(
        &self,
        text: &'text str,
        separators: &'static [&'static str],
        joiner: &'static str,
        atoms: &mut Vec<Atom<'text>>,
    ) {
        let (separator, remaining) = pick_separator(text, separators);
        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(start, ch)| &text[start..start + ch.len_utf8()])
                .collect()
        } else {
            text.split(separator)
                .filter(|piece| !piece.is_empty())
                .collect()
        };

        for (position, piece) in pieces.into_iter().enumerate() {
            let piece_joiner = if position == 0 { joiner } else { separator };
            let len = char_len(piece);
            if len > self.config.chunk_size && !remaining.is_empty() {
                self.split_recursive(piece, remaining, piece_joiner, atoms);
            } else {
                atoms.push(Atom {
                    text: piece,
                    len,
                    joiner: piece_joiner,
                });
            }
        }
    }

    /// Greedily joins atoms into windows no longer than the chunk size.
    ///
    /// All atoms go through one window, so the overlap is carried across
    /// boundaries where a long piece was split further.
    fn merge(&self, atoms: &[Atom<'_>]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<Atom<'_>> = VecDeque::new();
        let mut total = 0usize;

        for atom in atoms {
            let joiner_len = char_len(atom.joiner);
            if !window.is_empty() && total + joiner_len + atom.len > self.config.chunk_size {
                push_window(&mut merged, &window);
                // Drop from the front until only the overlap remains and the next atom fits.
                loop {
                    let overflows = !window.is_empty()
                        && total + joiner_len + atom.len > self.config.chunk_size;
                    if total <= self.config.overlap && !overflows {
                        break;
                    }
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    total -= front.len;
                    if let Some(next) = window.front() {
                        total -= char_len(next.joiner);
                    }
                }
            }
            if !window.is_empty() {
                total += joiner_len;
            }
            total += atom.len;
            window.push_back(*atom);
        }
        push_window(&mut merged, &window);
        merged
    }
}

/// A piece small enough to merge, with the separator that precedes it in the source text.
#[derive(Debug, Clone, Copy)]
struct Atom<'text> {
    text: &'text str,
    len: usize,
    joiner: &'static str,
}

fn pick_separator(
    text: &str,
    separators: &'static [&'static str],
) -> (&'static str, &'static [&'static str]) {
    for (index, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return (*separator, &[]);
        }
        if text.contains(*separator) {
            return (*separator, &separators[index + 1..]);
        }
    }
    ("", &[])
}

fn push_window(merged: &mut Vec<String>, window: &VecDeque<Atom<'_>>) {
    let mut joined = String::new();
    for (position, atom) in window.iter().enumerate() {
        if position > 0 {
            joined.push_str(atom.joiner);
        }
        joined.push_str(atom.text);
    }
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        merged.push(trimmed.to_owned());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
