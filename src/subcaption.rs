use crate::cache::normalize_whitespace;

/// One caption shown while a narration plays.
#[derive(Debug, Clone, PartialEq)]
pub struct Subcaption {
    pub text: String,
    /// Seconds the caption stays on screen.
    pub duration: f64,
    /// Seconds after the narration start at which the caption appears.
    pub offset: f64,
}

/// Split `text` into word-aligned captions of at most `max_len` characters.
///
/// Words are packed greedily; a word longer than `max_len` gets a caption of
/// its own. Each chunk gets a share of `duration` proportional to its length, minus
/// `buff` seconds of gap before the next one.
pub fn split_subcaptions(text: &str, duration: f64, max_len: usize, buff: f64) -> Vec<Subcaption> {
    let text = normalize_whitespace(text);
    if text.is_empty() {
        return Vec::new();
    }
    let chunks = pack_words(&text, max_len.max(1));

    let weight_total: usize = chunks.iter().map(|c| c.chars().count()).sum();
    let mut offset = 0.0;
    let mut captions = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let weight = chunk.chars().count() as f64 / weight_total as f64;
        let chunk_duration = duration * weight;
        captions.push(Subcaption {
            text: chunk,
            duration: (chunk_duration - buff).max(0.0),
            offset,
        });
        offset += chunk_duration;
    }
    captions
}

fn pack_words(text: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    for word in text.split(' ') {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_len {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
