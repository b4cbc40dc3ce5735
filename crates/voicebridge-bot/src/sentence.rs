//! Sentence chunking for streamed LLM text.
//!
//! TTS latency is dominated by the first sentence, so streamed deltas are cut
//! at sentence boundaries and handed to synthesis as soon as each sentence
//! completes instead of waiting for the full reply.

/// Accumulates streamed text and emits complete sentences.
///
/// A boundary is `.`, `!`, `?` or a newline followed by whitespace — the
/// lookahead keeps decimals like "3.14" intact. Whatever remains when the
/// stream ends is returned by [`flush`](Self::flush).
#[derive(Debug, Default)]
pub struct SentenceChunker {
    buffer: String,
}

impl SentenceChunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a streamed delta, returning any sentences it completed.
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);

        let mut sentences = Vec::new();
        loop {
            let split_at = self.find_boundary();
            match split_at {
                Some(idx) => {
                    let sentence: String = self.buffer.drain(..idx).collect();
                    let sentence = sentence.trim().to_string();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                }
                None => break,
            }
        }
        sentences
    }

    /// Emit whatever is buffered (call when the stream ends).
    pub fn flush(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    /// Byte index just past the first confirmed sentence boundary.
    fn find_boundary(&self) -> Option<usize> {
        let mut chars = self.buffer.char_indices().peekable();
        while let Some((idx, c)) = chars.next() {
            let is_boundary = matches!(c, '.' | '!' | '?' | '\n');
            if !is_boundary {
                continue;
            }
            if c == '\n' {
                return Some(idx + c.len_utf8());
            }
            // Punctuation only counts when followed by whitespace; a trailing
            // "." stays buffered until more text or flush decides.
            if let Some((_, next)) = chars.peek() {
                if next.is_whitespace() {
                    return Some(idx + c.len_utf8());
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_completed_by_later_delta() {
        let mut chunker = SentenceChunker::new();
        assert!(chunker.push("Hello the").is_empty());
        assert_eq!(chunker.push("re. How are").len(), 1);
    }

    #[test]
    fn test_multiple_sentences_in_one_delta() {
        let mut chunker = SentenceChunker::new();
        let sentences = chunker.push("One. Two! Three? And the rest");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?"]);
        assert_eq!(chunker.flush(), Some("And the rest".to_string()));
    }

    #[test]
    fn test_decimal_not_split() {
        let mut chunker = SentenceChunker::new();
        assert!(chunker.push("Pi is 3.14").is_empty());
        let sentences = chunker.push("159. Neat.");
        assert_eq!(sentences, vec!["Pi is 3.14159."]);
        // Trailing "Neat." has no lookahead yet
        assert_eq!(chunker.flush(), Some("Neat.".to_string()));
    }

    #[test]
    fn test_newline_is_a_boundary() {
        let mut chunker = SentenceChunker::new();
        let sentences = chunker.push("line one\nline two");
        assert_eq!(sentences, vec!["line one"]);
    }

    #[test]
    fn test_flush_empty_and_whitespace() {
        let mut chunker = SentenceChunker::new();
        assert_eq!(chunker.flush(), None);
        chunker.push("   ");
        assert_eq!(chunker.flush(), None);
    }
}
