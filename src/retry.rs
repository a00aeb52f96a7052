//! Bounded polling

/// An iteration budget
///
/// There's no clock to time out on; waiting for a reply means polling the link at most this many
/// times
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Budget {
    remaining: u32,
}

impl Budget {
    /// Creates a budget of `attempts` iterations
    pub fn new(attempts: u32) -> Self {
        Budget {
            remaining: attempts,
        }
    }

    /// Consumes one attempt; returns `false` if the budget was already exhausted
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }

    /// Attempts left
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Checks if no attempts are left
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}
