//! Simulated assistant replies for offline operation.

use std::ops::Range;
use std::time::Duration;

use futures::stream::BoxStream;
use rand::seq::SliceRandom;
use rand::Rng;

/// Canned phrase pool for simulated replies.
const PHRASES: &[&str] = &[
    "Thanks for the question, I'm happy to help with that.",
    "That's an interesting topic, let's explore it together.",
    "I have a few ideas that might be useful here.",
    "I see what you're asking. Here's what I think:",
    "Great question! Here's my answer:",
    "Based on what you've shared, here's what I can say:",
    "Glad to help! Here's what I know about this:",
    "That's an important point. Here's my detailed take:",
    "I understand the concern. Here's what I'd recommend:",
    "Thanks for sharing! Here are my thoughts on it:",
];

/// Uniform per-token pacing interval, in milliseconds.
const TOKEN_DELAY_MS: Range<u64> = 100..300;

/// Generates a word-by-word simulated reply when the backend is
/// unreachable.
///
/// Every invocation is independent: a fresh phrase is drawn and a fresh
/// pacing schedule rolled, with no state shared across calls.
#[derive(Debug, Clone)]
pub struct MockResponder {
    phrases: Vec<String>,
    token_delay_ms: Range<u64>,
}

impl Default for MockResponder {
    fn default() -> Self {
        Self {
            phrases: PHRASES.iter().map(|phrase| phrase.to_string()).collect(),
            token_delay_ms: TOKEN_DELAY_MS,
        }
    }
}

impl MockResponder {
    /// Override the pacing interval. `0..0` disables pacing entirely,
    /// which keeps tests off the wall clock.
    pub fn with_token_delay(mut self, delay_ms: Range<u64>) -> Self {
        self.token_delay_ms = delay_ms;
        self
    }

    /// Override the phrase pool.
    pub fn with_phrases(mut self, phrases: Vec<String>) -> Self {
        self.phrases = phrases;
        self
    }

    /// The current phrase pool.
    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Pick one phrase uniformly at random and stream cumulative snapshots
    /// of it, one whitespace-delimited token at a time.
    ///
    /// The last snapshot is the full phrase.
    pub fn stream_reply(&self) -> BoxStream<'static, String> {
        let phrase = self.pick_phrase();
        let delay_ms = self.token_delay_ms.clone();
        let tokens: Vec<String> = phrase.split_whitespace().map(str::to_string).collect();

        Box::pin(futures::stream::unfold(
            (String::new(), tokens.into_iter(), delay_ms),
            |(mut full, mut tokens, delay_ms)| async move {
                let token = tokens.next()?;
                tokio::time::sleep(random_delay(&delay_ms)).await;
                if !full.is_empty() {
                    full.push(' ');
                }
                full.push_str(&token);
                Some((full.clone(), (full, tokens, delay_ms)))
            },
        ))
    }

    fn pick_phrase(&self) -> String {
        self.phrases
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_default()
    }
}

fn random_delay(range: &Range<u64>) -> Duration {
    if range.is_empty() {
        return Duration::from_millis(range.start);
    }
    Duration::from_millis(rand::thread_rng().gen_range(range.clone()))
}
