/*!
# Patches

Core trait for textual rewrite rules driven by syntax-tree patterns.
*/

use crate::syntax::Captures;
use crate::Result;

/// A named rewrite rule
///
/// The engine runs [`Patch::search_pattern`] over the current tree and hands
/// every match to [`Patch::apply`]. The returned bytes replace the span of the
/// node bound to [`Patch::main_capture`]. Implementations are pure: the same
/// captures over the same source always produce the same bytes.
pub trait Patch: Send + Sync {
    /// Human-readable name for this patch
    fn name(&self) -> &'static str;

    /// Detailed description of what this patch does
    fn description(&self) -> &'static str;

    /// Priority for conflict resolution (higher priority wins an overlap)
    fn priority(&self) -> u32 {
        100
    }

    /// Tree-sitter query describing the shape to find
    fn search_pattern(&self) -> String;

    /// Capture whose span is replaced
    fn main_capture(&self) -> &'static str;

    /// Produce the replacement for one match
    ///
    /// Returns the captured text unchanged when the shape does not warrant a
    /// rewrite. An error aborts the whole translation.
    fn apply(&self, captures: &Captures<'_>, source: &[u8]) -> Result<Vec<u8>>;
}

/// Patch execution statistics
#[derive(Debug, Default, Clone)]
pub struct PatchStats {
    pub patch_name: String,
    pub matches: u64,
    pub no_ops: u64,
    pub applied: u64,
    pub conflicts_lost: u64,
    pub total_time_ms: u64,
}

impl PatchStats {
    pub fn new(patch_name: String) -> Self {
        Self {
            patch_name,
            ..Default::default()
        }
    }

    /// Share of matches that ended up rewriting text
    pub fn applied_rate(&self) -> f64 {
        if self.matches == 0 {
            0.0
        } else {
            (self.applied as f64) / (self.matches as f64)
        }
    }

    pub fn merge(&mut self, other: &PatchStats) {
        self.matches += other.matches;
        self.no_ops += other.no_ops;
        self.applied += other.applied;
        self.conflicts_lost += other.conflicts_lost;
        self.total_time_ms += other.total_time_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_rate() {
        let mut stats = PatchStats::new("Namespace".to_string());
        assert_eq!(stats.applied_rate(), 0.0);

        stats.matches = 4;
        stats.applied = 3;
        stats.no_ops = 1;
        assert_eq!(stats.applied_rate(), 0.75);

        let mut total = PatchStats::new("Namespace".to_string());
        total.merge(&stats);
        total.merge(&stats);
        assert_eq!(total.matches, 8);
        assert_eq!(total.no_ops, 2);
    }
}
