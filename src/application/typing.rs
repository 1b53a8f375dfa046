//! Typing simulation - re-chunks reply text for incremental delivery.
//!
//! Two chunking paths feed the streaming endpoint:
//!
//! - **Canned path**: a complete reply is split into sentences, then into
//!   small character groups, each carrying randomized pauses so the client
//!   sees human-typing pacing.
//! - **Live path**: provider fragments are buffered and re-flushed in larger
//!   pieces with negligible delay.
//!
//! Pacing is cosmetic; the one hard requirement is that concatenating the
//! emitted chunks reconstructs the source text exactly. All chunk boundaries
//! fall on `char` boundaries. Every probability and duration lives in
//! [`TypingConfig`] so tuning never touches the algorithm.

use rand::Rng;
use std::ops::RangeInclusive;
use std::time::Duration;

/// Characters that end a sentence (delimiter stays with its sentence).
const SENTENCE_TERMINALS: &[char] = &['。', '！', '？', '.', '!', '?'];

/// Characters flushed as standalone one-character chunks at a chunk boundary.
const BREAKING_CHARS: &[char] = &['、', ',', '\n'];

/// Trailing characters that earn the longer post-chunk pause.
const PAUSE_CHARS: &[char] = &['、', '。', '！', '？', ',', '.', '!', '?', '\n'];

/// Pacing and sizing knobs for the typing simulation.
#[derive(Debug, Clone)]
pub struct TypingConfig {
    /// Character-group size for canned-path chunks.
    pub chunk_chars: RangeInclusive<usize>,
    /// Probability of a "thinking" pause before a sentence (not the first).
    pub sentence_pause_probability: f64,
    /// Pre-sentence pause duration in milliseconds.
    pub sentence_pause_ms: RangeInclusive<u64>,
    /// Pause after a chunk ending in punctuation or newline.
    pub punctuation_pause_ms: RangeInclusive<u64>,
    /// Probability of an occasional longer think pause.
    pub think_probability: f64,
    pub think_pause_ms: RangeInclusive<u64>,
    /// Probability of a slow-typing pause.
    pub slow_probability: f64,
    pub slow_pause_ms: RangeInclusive<u64>,
    /// Default inter-chunk pause.
    pub base_pause_ms: RangeInclusive<u64>,
    /// Live path: buffered characters required before flushing.
    pub live_flush_threshold: usize,
    /// Live path: maximum characters per flushed chunk.
    pub live_max_flush: usize,
    /// Live path: delay between flushes.
    pub live_flush_delay: Duration,
    /// Quota fallback: delay between emitted lines.
    pub fallback_line_delay: Duration,
}

impl TypingConfig {
    /// Human-typing pacing used in production.
    pub fn natural() -> Self {
        Self {
            chunk_chars: 2..=5,
            sentence_pause_probability: 0.3,
            sentence_pause_ms: 300..=800,
            punctuation_pause_ms: 150..=300,
            think_probability: 0.1,
            think_pause_ms: 100..=200,
            slow_probability: 0.3,
            slow_pause_ms: 40..=80,
            base_pause_ms: 20..=40,
            live_flush_threshold: 20,
            live_max_flush: 50,
            live_flush_delay: Duration::from_millis(1),
            fallback_line_delay: Duration::from_millis(50),
        }
    }

    /// Zero-delay profile for tests; chunk sizing is unchanged.
    pub fn instant() -> Self {
        Self {
            sentence_pause_probability: 0.0,
            sentence_pause_ms: 0..=0,
            punctuation_pause_ms: 0..=0,
            think_probability: 0.0,
            think_pause_ms: 0..=0,
            slow_probability: 0.0,
            slow_pause_ms: 0..=0,
            base_pause_ms: 0..=0,
            live_flush_delay: Duration::ZERO,
            fallback_line_delay: Duration::ZERO,
            ..Self::natural()
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self::natural()
    }
}

/// One planned emission: the text plus the pauses around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedChunk {
    pub text: String,
    /// Slept before emitting (pre-sentence thinking pause).
    pub pre_pause: Duration,
    /// Slept after emitting.
    pub post_pause: Duration,
}

/// Splits text into sentences on sentence-final punctuation, keeping each
/// delimiter attached to its sentence. Concatenating the result yields the
/// input exactly.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        current.push(c);
        if SENTENCE_TERMINALS.contains(&c) {
            sentences.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Groups a sentence into chunks of randomized length; a comma or newline at
/// a chunk boundary becomes its own one-character chunk.
pub fn chunk_sentence(sentence: &str, config: &TypingConfig, rng: &mut impl Rng) -> Vec<String> {
    let chars: Vec<char> = sentence.chars().collect();
    let mut chunks: Vec<String> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if BREAKING_CHARS.contains(&chars[i]) && !chunks.is_empty() {
            chunks.push(chars[i].to_string());
            i += 1;
            continue;
        }
        let size = rng.gen_range(config.chunk_chars.clone()).max(1);
        let end = (i + size).min(chars.len());
        chunks.push(chars[i..end].iter().collect());
        i = end;
    }
    chunks
}

/// Plans the full emission schedule for a complete reply text.
pub fn plan_typing_chunks(
    text: &str,
    config: &TypingConfig,
    rng: &mut impl Rng,
) -> Vec<TypedChunk> {
    let mut plan = Vec::new();
    for (sentence_index, sentence) in split_sentences(text).iter().enumerate() {
        let mut pre_pause = Duration::ZERO;
        if sentence_index > 0 && rng.gen_bool(config.sentence_pause_probability) {
            pre_pause = sample_ms(&config.sentence_pause_ms, rng);
        }
        for chunk in chunk_sentence(sentence, config, rng) {
            let post_pause = post_chunk_pause(&chunk, config, rng);
            plan.push(TypedChunk {
                text: chunk,
                pre_pause: std::mem::take(&mut pre_pause),
                post_pause,
            });
        }
    }
    plan
}

/// Picks the pause following one emitted chunk.
fn post_chunk_pause(chunk: &str, config: &TypingConfig, rng: &mut impl Rng) -> Duration {
    let trailing_pause = chunk
        .chars()
        .next_back()
        .is_some_and(|c| PAUSE_CHARS.contains(&c));
    if trailing_pause {
        sample_ms(&config.punctuation_pause_ms, rng)
    } else if rng.gen_bool(config.think_probability) {
        sample_ms(&config.think_pause_ms, rng)
    } else if rng.gen_bool(config.slow_probability) {
        sample_ms(&config.slow_pause_ms, rng)
    } else {
        sample_ms(&config.base_pause_ms, rng)
    }
}

fn sample_ms(range: &RangeInclusive<u64>, rng: &mut impl Rng) -> Duration {
    Duration::from_millis(rng.gen_range(range.clone()))
}

/// Re-segments live provider fragments into larger flushes.
///
/// Fragments accumulate until [`TypingConfig::live_flush_threshold`]
/// characters are buffered, then flush in pieces of at most
/// [`TypingConfig::live_max_flush`] characters. [`LiveRechunker::finish`]
/// drains whatever remains at stream end.
#[derive(Debug)]
pub struct LiveRechunker {
    buffer: String,
    buffered_chars: usize,
    threshold: usize,
    max_flush: usize,
}

impl LiveRechunker {
    pub fn new(config: &TypingConfig) -> Self {
        Self {
            buffer: String::new(),
            buffered_chars: 0,
            threshold: config.live_flush_threshold.max(1),
            max_flush: config.live_max_flush.max(1),
        }
    }

    /// Buffers a fragment and returns any chunks ready to emit.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);
        self.buffered_chars += fragment.chars().count();

        let mut flushed = Vec::new();
        while self.buffered_chars >= self.threshold {
            let take = self.buffered_chars.min(self.max_flush);
            flushed.push(self.take_chars(take));
        }
        flushed
    }

    /// Flushes the remaining buffer, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take_chars(self.buffered_chars))
        }
    }

    fn take_chars(&mut self, count: usize) -> String {
        let split_at = self
            .buffer
            .char_indices()
            .nth(count)
            .map_or(self.buffer.len(), |(byte_index, _)| byte_index);
        let rest = self.buffer.split_off(split_at);
        self.buffered_chars -= count;
        std::mem::replace(&mut self.buffer, rest)
    }
}

/// Splits the quota-fallback apology into per-line emissions.
///
/// Matches the fallback delivery format: each non-empty line is emitted with
/// a trailing newline.
pub fn fallback_lines(text: &str) -> Vec<String> {
    text.split('\n')
        .filter(|line| !line.is_empty())
        .map(|line| format!("{}\n", line))
        .collect()
}
