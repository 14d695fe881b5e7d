//! Bounds-safe token sequence
//!
//! Command arguments are consumed left to right by cutters. Each step hands
//! back a new `TokenSeq` view over the same shared buffer, so consuming is
//! cheap and the original sequence stays intact.

use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct TokenSeq {
    tokens: Arc<[String]>,
    start: usize,
    end: usize,
}

impl TokenSeq {
    pub fn new(tokens: Vec<String>) -> Self {
        let end = tokens.len();
        Self {
            tokens: tokens.into(),
            start: 0,
            end,
        }
    }

    /// Split raw argument text on whitespace
    pub fn from_text(text: &str) -> Self {
        Self::new(text.split_whitespace().map(str::to_string).collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Token at `index`, `None` past the end
    pub fn get(&self, index: usize) -> Option<&str> {
        if index >= self.len() {
            return None;
        }
        self.tokens.get(self.start + index).map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.get(0)
    }

    /// Sub-sequence for `range`, clipped to the available tokens
    ///
    /// Out-of-range or inverted bounds yield an empty sequence.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Self {
        let len = self.len();
        let lo = match range.start_bound() {
            Bound::Included(&n) => n,
            Bound::Excluded(&n) => n.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let hi = match range.end_bound() {
            Bound::Included(&n) => n.saturating_add(1),
            Bound::Excluded(&n) => n,
            Bound::Unbounded => len,
        };
        let lo = lo.min(len);
        let hi = hi.clamp(lo, len);
        Self {
            tokens: Arc::clone(&self.tokens),
            start: self.start + lo,
            end: self.start + hi,
        }
    }

    /// Everything after the first `n` tokens
    pub fn skip(&self, n: usize) -> Self {
        self.slice(n..)
    }

    /// All tokens joined with single spaces, plus the (empty) remainder
    pub fn take_rest(&self) -> (String, Self) {
        (self.join(), self.slice(self.len()..))
    }

    pub fn join(&self) -> String {
        self.iter().collect::<Vec<_>>().join(" ")
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens[self.start..self.end].iter().map(String::as_str)
    }
}

impl PartialEq for TokenSeq {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for TokenSeq {}

impl fmt::Debug for TokenSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl From<Vec<&str>> for TokenSeq {
    fn from(tokens: Vec<&str>) -> Self {
        Self::new(tokens.into_iter().map(str::to_string).collect())
    }
}
