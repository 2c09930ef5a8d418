//! Recursive character splitter.
//!
//! Lengths are counted in chars (Unicode scalar values). Text is split on the
//! coarsest separator it contains (blank line, newline, space, then single
//! chars); pieces are greedily merged back up to `chunk_size`, and each new
//! chunk starts with up to `chunk_overlap` chars carried over from the end of
//! the previous one.

use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 150,
        }
    }
}

pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        let size = config.chunk_size.max(1);
        Self {
            size,
            overlap: config.chunk_overlap.min(size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (pos, sep) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || text.contains(**s))
            .map(|(i, s)| (i, *s))
            .unwrap_or((separators.len(), ""));
        let finer = separators.get(pos + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if sep.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(sep).filter(|s| !s.is_empty()).collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(&fitting, sep));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece.to_string());
            } else {
                out.extend(self.split_with(piece, finer));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(&fitting, sep));
        }
        out
    }

    fn merge(&self, splits: &[&str], sep: &str) -> Vec<String> {
        let sep_len = char_len(sep);
        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for split in splits {
            let len = char_len(split);
            let joined = if current.is_empty() { 0 } else { sep_len };
            if total + len + joined > self.size && !current.is_empty() {
                push_joined(&current, sep, &mut docs);
                while total > self.overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len } > self.size)
                {
                    let dropped = if current.len() > 1 { sep_len } else { 0 };
                    match current.pop_front() {
                        Some(first) => total -= char_len(first) + dropped,
                        None => break,
                    }
                }
            }
            current.push_back(split);
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }
        push_joined(&current, sep, &mut docs);
        docs
    }
}

fn push_joined(parts: &VecDeque<&str>, sep: &str, docs: &mut Vec<String>) {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(sep);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
