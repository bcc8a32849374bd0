#[derive(Debug, Clone)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Window-based splitter with boundary preference: paragraph break, then
/// line break, then word break, then a hard character cut. Operates on
/// char indices, so multibyte text never splits inside a scalar.
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let size = self.config.chunk_size.max(1);
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let window_end = (start + size).min(chars.len());
            let end = if window_end == chars.len() {
                window_end
            } else {
                best_cut(&chars, start, window_end)
            };

            let chunk: String = chars[start..end].iter().collect();
            if !chunk.trim().is_empty() {
                chunks.push(chunk);
            }

            if end == chars.len() {
                break;
            }
            // Carry overlap into the next chunk, always moving forward.
            start = end.saturating_sub(overlap).max(start + 1);
        }

        chunks
    }
}

/// Best cut position in `[start, window_end)`: the latest preferred
/// boundary in the back half of the window, or the hard window end.
fn best_cut(chars: &[char], start: usize, window_end: usize) -> usize {
    let min_cut = start + (window_end - start) / 2;

    if let Some(pos) = rfind_paragraph(chars, min_cut, window_end) {
        return pos;
    }
    if let Some(pos) = rfind_char(chars, min_cut, window_end, '\n') {
        return pos;
    }
    if let Some(pos) = rfind_char(chars, min_cut, window_end, ' ') {
        return pos;
    }
    window_end
}

/// Latest `\n\n` in `[min, end)`, returning the index just past it.
fn rfind_paragraph(chars: &[char], min: usize, end: usize) -> Option<usize> {
    (min..end.saturating_sub(1))
        .rev()
        .find(|&i| chars[i] == '\n' && chars[i + 1] == '\n')
        .map(|i| i + 2)
}

/// Latest `sep` in `[min, end)`, returning the index just past it.
fn rfind_char(chars: &[char], min: usize, end: usize, sep: char) -> Option<usize> {
    (min..end).rev().find(|&i| chars[i] == sep).map(|i| i + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(SplitterConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        })
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(splitter(100, 10).split("").is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = splitter(1000, 200).split("Hello world.");
        assert_eq!(chunks, vec!["Hello world."]);
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let text = format!("{}\n\n{}", "a".repeat(80), "b".repeat(80));
        let chunks = splitter(100, 0).split(&text);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].starts_with('a'));
        assert_eq!(chunks[1], "b".repeat(80));
    }

    #[test]
    fn falls_back_to_line_breaks() {
        let text = format!("{}\n{}", "a".repeat(80), "b".repeat(80));
        let chunks = splitter(100, 0).split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "b".repeat(80));
    }

    #[test]
    fn falls_back_to_word_breaks() {
        let text = format!("{} {}", "a".repeat(80), "b".repeat(80));
        let chunks = splitter(100, 0).split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "b".repeat(80));
    }

    #[test]
    fn hard_cut_when_no_boundary() {
        let text = "a".repeat(250);
        let chunks = splitter(100, 0).split(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn overlap_repeats_tail_of_previous_chunk() {
        let text = "a".repeat(150);
        let chunks = splitter(100, 20).split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 100);
        // Next chunk restarts 20 chars back.
        assert_eq!(chunks[1].len(), 70);
    }

    #[test]
    fn boundary_ignored_in_front_half_of_window() {
        // A space at position 10 of a 100-char window is too early to cut.
        let text = format!("{} {}", "a".repeat(10), "b".repeat(120));
        let chunks = splitter(100, 0).split(&text);
        assert_eq!(chunks[0].len(), 100);
    }

    #[test]
    fn multibyte_text_splits_on_char_indices() {
        let text = "é".repeat(250);
        let chunks = splitter(100, 0).split(&text);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 100);
    }

    #[test]
    fn whitespace_only_windows_are_dropped() {
        let chunks = splitter(10, 0).split("               ");
        assert!(chunks.is_empty());
    }

    #[test]
    fn plain_text_chunk_count_matches_stride() {
        // Uniform text with no boundaries: count is ceil((len - o) / (s - o)).
        let len = 1000;
        let (size, overlap) = (100, 20);
        let chunks = splitter(size, overlap).split(&"x".repeat(len));
        let expected = (len - overlap).div_ceil(size - overlap);
        assert_eq!(chunks.len(), expected);
    }

    mod proptest_splitter {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(1000))]

            #[test]
            fn split_never_panics(
                content in "\\PC{0,5000}",
                chunk_size in 1usize..2000,
                chunk_overlap in 0usize..500,
            ) {
                let _ = splitter(chunk_size, chunk_overlap).split(&content);
            }

            #[test]
            fn chunks_are_never_empty(
                content in "[a-z \\n.]{0,2000}",
                chunk_size in 1usize..300,
                chunk_overlap in 0usize..100,
            ) {
                for chunk in splitter(chunk_size, chunk_overlap).split(&content) {
                    prop_assert!(!chunk.trim().is_empty());
                }
            }

            #[test]
            fn no_chunk_exceeds_size(
                content in "[a-z \\n]{0,2000}",
                chunk_size in 1usize..300,
            ) {
                for chunk in splitter(chunk_size, 0).split(&content) {
                    prop_assert!(chunk.chars().count() <= chunk_size);
                }
            }

            #[test]
            fn zero_overlap_covers_all_content(
                content in "[a-z]{1,1000}",
                chunk_size in 1usize..200,
            ) {
                // Uniform text, no separators: concatenation restores input.
                let chunks = splitter(chunk_size, 0).split(&content);
                let joined: String = chunks.concat();
                prop_assert_eq!(joined, content);
            }

            #[test]
            fn overlap_makes_progress(
                content in "[a-z ]{1,1000}",
                chunk_size in 1usize..100,
                chunk_overlap in 0usize..200,
            ) {
                // Even overlap >= chunk_size must terminate.
                let chunks = splitter(chunk_size, chunk_overlap).split(&content);
                prop_assert!(chunks.len() <= content.len());
            }
        }
    }
}
