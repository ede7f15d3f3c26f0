//! Text splitting helpers for length-limited synthesis backends.

/// Very lightweight sentence splitter based on punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            if current.chars().any(|c| !c.is_whitespace()) {
                sentences.push(std::mem::take(&mut current));
            }
            current.clear();
        }
    }

    if current.chars().any(|c| !c.is_whitespace()) {
        sentences.push(current);
    }

    sentences
}

/// Pack `text` into ordered chunks of at most `limit` bytes.
///
/// Whole sentences are kept together when they fit; longer sentences are cut
/// at whitespace, and single words longer than the limit at char boundaries.
/// Chunks are trimmed and never empty.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        for piece in split_oversized(&sentence, limit) {
            if !current.is_empty() && current.len() + piece.len() > limit {
                push_trimmed(&mut chunks, std::mem::take(&mut current));
            }
            current.push_str(&piece);
        }
    }
    push_trimmed(&mut chunks, current);

    chunks
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: String) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn split_oversized(sentence: &str, limit: usize) -> Vec<String> {
    if sentence.len() <= limit {
        return vec![sentence.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in sentence.split_inclusive(char::is_whitespace) {
        if word.len() > limit {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(split_at_char_boundaries(word, limit));
            continue;
        }
        if !current.is_empty() && current.len() + word.len() > limit {
            pieces.push(std::mem::take(&mut current));
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn split_at_char_boundaries(word: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        if !current.is_empty() && current.len() + ch.len_utf8() > limit {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}
