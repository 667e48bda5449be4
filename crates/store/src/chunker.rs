//! Recursive character splitter.
//!
//! Text is first cut into pieces no longer than `chunk_size`, trying
//! paragraph breaks, then line breaks, sentence ends and spaces, and
//! finally single characters. Pieces are then merged greedily into chunks;
//! each new chunk starts with the trailing pieces of the previous one, up
//! to `chunk_overlap` characters.

use std::collections::VecDeque;
use std::ops::Range;

use tazmic_core::error::StoreError;

/// Break candidates, most preferred first. Below the last one, text is
/// split into single characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// A span of source text produced by the chunker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    /// Character (not byte) offset into the source text
    pub start_offset: usize,
}

impl TextChunk {
    /// Character offset one past the last character of this chunk.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.content.chars().count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, StoreError> {
        if chunk_size == 0 {
            return Err(StoreError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(StoreError::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into overlapping chunks of at most `chunk_size` characters.
    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let mut pieces = Vec::new();
        self.split_span(&chars, 0..chars.len(), 0, &mut pieces);
        self.merge(&chars, pieces)
    }

    /// Cut `span` into contiguous pieces of at most `chunk_size` characters.
    fn split_span(&self, chars: &[char], span: Range<usize>, level: usize, out: &mut Vec<Range<usize>>) {
        if span.len() <= self.chunk_size {
            out.push(span);
            return;
        }

        let Some(sep) = SEPARATORS.get(level) else {
            out.extend((span.start..span.end).map(|i| i..i + 1));
            return;
        };
        let sep: Vec<char> = sep.chars().collect();

        let mut piece_start = span.start;
        let mut i = span.start;
        while i + sep.len() <= span.end {
            if chars[i..i + sep.len()] == *sep {
                // Separator stays with the text before it
                let piece_end = i + sep.len();
                self.split_span(chars, piece_start..piece_end, level + 1, out);
                piece_start = piece_end;
                i = piece_end;
            } else {
                i += 1;
            }
        }
        if piece_start < span.end {
            self.split_span(chars, piece_start..span.end, level + 1, out);
        }
    }

    /// Greedily merge contiguous pieces into overlapping chunks.
    fn merge(&self, chars: &[char], pieces: Vec<Range<usize>>) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<Range<usize>> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = piece.len();
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(chars, &window, &mut chunks);
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some(dropped) => total -= dropped.len(),
                        None => break,
                    }
                }
            }
            total += len;
            window.push_back(piece);
        }

        if !window.is_empty() {
            push_trimmed(chars, &window, &mut chunks);
        }
        chunks
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Emit the window's span with surrounding whitespace removed.
fn push_trimmed(chars: &[char], window: &VecDeque<Range<usize>>, out: &mut Vec<TextChunk>) {
    let (Some(first), Some(last)) = (window.front(), window.back()) else {
        return;
    };
    let span = &chars[first.start..last.end];
    let lead = span.iter().take_while(|c| c.is_whitespace()).count();
    if lead == span.len() {
        return;
    }
    let trail = span.iter().rev().take_while(|c| c.is_whitespace()).count();
    out.push(TextChunk {
        content: span[lead..span.len() - trail].iter().collect(),
        start_offset: first.start + lead,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 150).is_err());
        assert!(Chunker::new(100, 99).is_ok());
    }

    #[test]
    fn short_text_is_single_chunk() {
        let chunks = Chunker::default().split("the sky is blue");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "the sky is blue");
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn whitespace_only_yields_nothing() {
        assert!(Chunker::default().split("").is_empty());
        assert!(Chunker::default().split("  \n\n \t ").is_empty());
    }

    #[test]
    fn chunks_respect_size_and_overlap() {
        let chunker = Chunker::new(100, 20).unwrap();
        let text = words(200);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);

        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= 100);
        }
        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(b.start_offset > a.start_offset);
            // Overlap never exceeds the configured amount
            assert!(a.end_offset().saturating_sub(b.start_offset) <= 20);
            // Consecutive chunks do overlap
            assert!(b.start_offset < a.end_offset());
        }
    }

    #[test]
    fn chunks_end_on_word_boundaries() {
        let text = words(300);
        for chunk in Chunker::new(80, 15).unwrap().split(&text) {
            for word in chunk.content.split(' ') {
                assert!(word.starts_with("word"), "fragment {word:?}");
            }
        }
    }

    #[test]
    fn offsets_point_into_source() {
        let chunker = Chunker::new(50, 10).unwrap();
        let text = words(60);
        let chars: Vec<char> = text.chars().collect();
        for chunk in chunker.split(&text) {
            let slice: String = chars[chunk.start_offset..chunk.end_offset()].iter().collect();
            assert_eq!(slice, chunk.content);
        }
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let para_a = "a".repeat(60);
        let para_b = "b".repeat(60);
        let text = format!("{para_a}\n\n{para_b}");
        let chunks = Chunker::new(100, 10).unwrap().split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, para_a);
        assert_eq!(chunks[1].content, para_b);
        assert_eq!(chunks[1].start_offset, 62);
    }

    #[test]
    fn prefers_sentence_end_over_space() {
        let text = "First sentence here. Second sentence runs on and on without stopping";
        let chunks = Chunker::new(25, 5).unwrap().split(text);
        assert_eq!(chunks[0].content, "First sentence here.");
    }

    #[test]
    fn hard_cuts_unbroken_text_with_overlap() {
        let text = "x".repeat(250);
        let chunks = Chunker::new(100, 20).unwrap().split(&text);
        assert_eq!(chunks[0].content.len(), 100);
        assert_eq!(chunks[1].start_offset, 80);
        assert!(chunks.iter().all(|c| c.content.len() <= 100));
        assert_eq!(chunks.last().unwrap().end_offset(), 250);
    }

    #[test]
    fn handles_multibyte_text() {
        let text = "é".repeat(150);
        let chunks = Chunker::new(100, 10).unwrap().split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.chars().count(), 100);
        assert_eq!(chunks[1].start_offset, 90);
    }
}
