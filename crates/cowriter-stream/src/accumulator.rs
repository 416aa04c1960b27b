/// Per-request holder for the running generation text.
///
/// The backend sends the whole text so far with every token, so the latest
/// token always wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenAccumulator {
    buffer: String,
    done: bool,
    tokens: u64,
}

impl TokenAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one token carrying the running text `accumulated`.
    pub fn push(&mut self, accumulated: &str, done: bool) {
        self.buffer.clear();
        self.buffer.push_str(accumulated);
        self.done = done;
        self.tokens = self.tokens.saturating_add(1);
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of tokens recorded since the last reset.
    pub fn token_count(&self) -> u64 {
        self.tokens
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
