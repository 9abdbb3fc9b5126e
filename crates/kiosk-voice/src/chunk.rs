//! Sentence-bounded text chunking.
//!
//! Some synthesis engines stall or cut off on long strings, so long prompts are spoken as
//! a series of ~100 character chunks. Sentences are kept whole when they fit; longer ones are
//! split at word boundaries.

/// Characters that end a sentence when followed by whitespace or end of text.
const SENTENCE_END: [char; 4] = ['.', '!', '?', '…'];

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// True when `text` is long enough to be chunked.
pub fn needs_chunking(text: &str, threshold: usize) -> bool {
    char_len(text.trim()) > threshold
}

/// Split into sentences, keeping the terminating punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary = chars.peek().map_or(true, |next| next.is_whitespace());
        if SENTENCE_END.contains(&c) && at_boundary {
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);
    sentences
}

/// Pack sentences into chunks of at most `max_chars` characters (single words longer than
/// that stay whole).
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        for piece in split_long(&sentence, max_chars) {
            if current.is_empty() {
                current = piece;
            } else if char_len(&current) + 1 + char_len(&piece) <= max_chars {
                current.push(' ');
                current.push_str(&piece);
            } else {
                chunks.push(std::mem::replace(&mut current, piece));
            }
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long(sentence: &str, max_chars: usize) -> Vec<String> {
    if char_len(sentence) <= max_chars {
        return vec![sentence.to_string()];
    }
    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in sentence.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if char_len(&current) + 1 + char_len(word) <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            pieces.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}
