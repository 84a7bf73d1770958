/// Monotonic 1-based ordinal generator.
///
/// A session keeps one for parameter binding and one for column reading;
/// neither is shared beyond the session that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCounter {
    next: usize,
}

impl SequenceCounter {
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Return the current ordinal and advance by one.
    pub fn next(&mut self) -> usize {
        let ordinal = self.next;
        self.next += 1;
        ordinal
    }

    /// The ordinal most recently returned by [`next`](Self::next), or 0 if
    /// nothing has been consumed yet.
    #[must_use]
    pub fn current(&self) -> usize {
        self.next - 1
    }

    /// Start over at ordinal 1.
    pub fn reset(&mut self) {
        self.next = 1;
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
