//! Overlapping chunking of long email bodies. All sizes count characters.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitterConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub sentence_aware: bool,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            sentence_aware: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(config: SplitterConfig) -> Self {
        Self {
            config: SplitterConfig {
                chunk_size: config.chunk_size.max(1),
                ..config
            },
        }
    }

    /// Split `text` into chunks of at most `chunk_size` characters.
    ///
    /// Whitespace-only chunks are dropped, so a blank body yields nothing.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let SplitterConfig {
            chunk_size,
            chunk_overlap,
            sentence_aware,
        } = self.config;

        let chunks = if sentence_aware {
            let mut pieces = Vec::new();
            for sentence in split_sentences(text) {
                if char_len(&sentence) > chunk_size {
                    pieces.extend(split_chars(&sentence, chunk_size, 0));
                } else {
                    pieces.push(sentence);
                }
            }
            merge_sentences(&pieces, chunk_size, chunk_overlap)
        } else {
            split_chars(text, chunk_size, chunk_overlap)
        };

        chunks
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let next = chars.peek().copied();

        if c == '\n' && next == Some('\n') {
            current.push('\n');
            chars.next();
            if !current.trim().is_empty() {
                sentences.push(std::mem::take(&mut current));
            }
        } else if matches!(c, '.' | '?' | '!')
            && next.is_some_and(char::is_whitespace)
            && !current.trim().is_empty()
        {
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Merge sentences into chunks no longer than `chunk_size`, carrying trailing
/// sentences up to `chunk_overlap` characters into the next chunk.
fn merge_sentences(sentences: &[String], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut window_start = 0;

    for (idx, sentence) in sentences.iter().enumerate() {
        let len = char_len(sentence);
        if current_len > 0 && current_len + len > chunk_size {
            chunks.push(std::mem::take(&mut current));

            let mut overlap_len = 0;
            let mut overlap_start = idx;
            for i in (window_start..idx).rev() {
                let l = char_len(&sentences[i]);
                if overlap_len + l > chunk_overlap || overlap_len + l + len > chunk_size {
                    break;
                }
                overlap_len += l;
                overlap_start = i;
            }
            for s in &sentences[overlap_start..idx] {
                current.push_str(s);
            }
            current_len = overlap_len;
            window_start = overlap_start;
        }
        current.push_str(sentence);
        current_len += len;
    }

    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

fn split_chars(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
