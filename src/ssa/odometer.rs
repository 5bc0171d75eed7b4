//! Per-nesting-level unwinding counters.
//!
//! The odometer holds one counter per loop nesting level, outermost first.
//! Entering a nested loop pushes a fresh level at zero, leaving it pops the
//! level. Unwinding the innermost loop once more increments its level;
//! re-entering a loop resets it. A symbol defined at nesting depth `d` is
//! renamed with the first `d` levels, so deeper unwindings of an inner loop
//! get fresh names without renaming anything the outer levels already
//! produced.

use std::fmt;

/// Unwinding counters, one per loop nesting level, outermost first.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Odometer {
    levels: Vec<u32>,
}

impl Odometer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[u32] {
        &self.levels
    }

    /// Counter of the innermost level.
    pub fn current(&self) -> Option<u32> {
        self.levels.last().copied()
    }

    /// Enters a nested loop.
    pub fn push(&mut self) {
        self.levels.push(0);
    }

    /// Enters a nested loop that was already unwound `level` times in the
    /// current context.
    pub fn push_at(&mut self, level: u32) {
        self.levels.push(level);
    }

    /// Leaves the innermost loop.
    pub fn pop(&mut self) -> Option<u32> {
        self.levels.pop()
    }

    /// Next unwinding of the innermost loop.
    ///
    /// # Panics
    ///
    /// Panics if no loop has been entered.
    pub fn increment(&mut self) {
        let top = self.levels.last_mut().expect("increment outside of any loop");
        *top += 1;
    }

    /// Previous unwinding of the innermost loop; stays at zero.
    pub fn decrement(&mut self) {
        if let Some(top) = self.levels.last_mut() {
            *top = top.saturating_sub(1);
        }
    }

    /// Re-entry of the innermost loop.
    pub fn reset(&mut self) {
        if let Some(top) = self.levels.last_mut() {
            *top = 0;
        }
    }

    /// Suffix for a symbol defined at nesting depth `depth`.
    pub fn suffix(&self, depth: usize) -> String {
        suffix_of(&self.levels, depth)
    }
}

/// The first `depth` of `levels`, padded with zeros; the base instance
/// (all zeros) has the empty suffix.
pub fn suffix_of(levels: &[u32], depth: usize) -> String {
    let padded: Vec<u32> = (0..depth).map(|i| levels.get(i).copied().unwrap_or(0)).collect();
    if padded.iter().all(|&l| l == 0) {
        return String::new();
    }
    padded.iter().map(|l| l.to_string()).collect::<Vec<_>>().join(".")
}

impl fmt::Display for Odometer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, l) in self.levels.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", l)?;
        }
        write!(f, "]")
    }
}
