/*!
# Translation Engine

Drives a set of patches over one file until no patch finds anything left to
rewrite. Every pass parses the current bytes, lets each patch claim spans,
keeps a non-overlapping subset of the claims and splices them in at once.
*/

use std::collections::HashSet;
use std::ops::Range;
use std::time::Instant;

use indexmap::IndexMap;
use tracing::debug;
use tree_sitter::Query;

use crate::patch::{Patch, PatchStats};
use crate::syntax::{CppSyntax, SourceUnit};
use crate::{Result, TranslateError};

/// A patch together with its compiled search pattern
struct CompiledPatch {
    patch: Box<dyn Patch>,
    query: Query,
}

/// One match with its computed replacement, competing for its span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Position of the patch in the engine's priority order
    pub patch: usize,
    pub patch_name: &'static str,
    pub priority: u32,
    pub range: Range<usize>,
    pub replacement: Vec<u8>,
}

/// Claims split into the ones to apply (sorted by position) and the losers
#[derive(Debug, Default)]
pub struct Resolution {
    pub accepted: Vec<Claim>,
    pub lost: Vec<Claim>,
}

/// Per-file rewrite engine
pub struct TranslationEngine {
    syntax: CppSyntax,
    patches: Vec<CompiledPatch>,
    stats: IndexMap<String, PatchStats>,
    max_iterations: usize,
}

impl TranslationEngine {
    pub fn new() -> Result<Self> {
        Ok(Self {
            syntax: CppSyntax::new()?,
            patches: Vec::new(),
            stats: IndexMap::new(),
            max_iterations: 64,
        })
    }

    /// Build an engine holding `patches`
    pub fn with_patches(patches: Vec<Box<dyn Patch>>) -> Result<Self> {
        let mut engine = Self::new()?;
        for patch in patches {
            engine.add_patch(patch)?;
        }
        Ok(engine)
    }

    /// Set maximum number of rewrite passes per file
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Add a patch, compiling its search pattern
    ///
    /// Patches stay sorted by priority (higher first); equal priorities keep
    /// insertion order.
    pub fn add_patch(&mut self, patch: Box<dyn Patch>) -> Result<()> {
        let query = self.syntax.compile(patch.name(), &patch.search_pattern())?;
        self.stats
            .entry(patch.name().to_string())
            .or_insert_with(|| PatchStats::new(patch.name().to_string()));
        self.patches.push(CompiledPatch { patch, query });
        self.patches
            .sort_by_key(|compiled| std::cmp::Reverse(compiled.patch.priority()));
        Ok(())
    }

    /// Names of the registered patches in priority order
    pub fn patch_names(&self) -> Vec<&'static str> {
        self.patches.iter().map(|compiled| compiled.patch.name()).collect()
    }

    /// Rewrite one file's bytes to a fixpoint
    pub fn translate(&mut self, source: Vec<u8>) -> Result<Vec<u8>> {
        let mut source = source;
        let mut passes = 0;

        loop {
            let unit = self.syntax.parse(source)?;
            let claims = self.collect_claims(&unit)?;

            if claims.is_empty() {
                debug!(passes, "No claims left");
                return Ok(unit.into_source());
            }
            if passes == self.max_iterations {
                return Err(TranslateError::IterationLimit(self.max_iterations));
            }

            let resolution = resolve_claims(claims)?;
            for claim in &resolution.lost {
                if let Some(stats) = self.stats.get_mut(claim.patch_name) {
                    stats.conflicts_lost += 1;
                }
            }
            for claim in &resolution.accepted {
                if let Some(stats) = self.stats.get_mut(claim.patch_name) {
                    stats.applied += 1;
                }
            }
            debug!(
                pass = passes,
                applied = resolution.accepted.len(),
                deferred = resolution.lost.len(),
                "Applying claims"
            );

            source = splice(unit.source(), &resolution.accepted);
            passes += 1;
        }
    }

    /// Run every patch over the unit and keep the matches that change text
    fn collect_claims(&mut self, unit: &SourceUnit) -> Result<Vec<Claim>> {
        let mut claims = Vec::new();

        for (order, compiled) in self.patches.iter().enumerate() {
            let start_time = Instant::now();
            let patch = compiled.patch.as_ref();
            let stats = self
                .stats
                .entry(patch.name().to_string())
                .or_insert_with(|| PatchStats::new(patch.name().to_string()));

            let mut seen = HashSet::new();
            for captures in unit.query(&compiled.query) {
                let Some(main) = captures.get(patch.main_capture()) else {
                    debug!(patch = patch.name(), "Match without main capture skipped");
                    continue;
                };
                let range = main.byte_range();
                // Quantified patterns may report the same root more than once
                if !seen.insert((range.start, range.end)) {
                    continue;
                }
                stats.matches += 1;

                let replacement = patch.apply(&captures, unit.source())?;
                if replacement.as_slice() == &unit.source()[range.clone()] {
                    stats.no_ops += 1;
                    continue;
                }

                claims.push(Claim {
                    patch: order,
                    patch_name: patch.name(),
                    priority: patch.priority(),
                    range,
                    replacement,
                });
            }

            stats.total_time_ms += start_time.elapsed().as_millis() as u64;
        }

        Ok(claims)
    }

    /// Get patch statistics
    pub fn stats(&self) -> &IndexMap<String, PatchStats> {
        &self.stats
    }

    /// Clear statistics
    pub fn clear_stats(&mut self) {
        for stats in self.stats.values_mut() {
            *stats = PatchStats::new(stats.patch_name.clone());
        }
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Pick a non-overlapping subset of claims
///
/// Claims are ranked by priority (higher first), then start offset (leftmost
/// first), then length (outer span first), then patch order; each claim is
/// kept unless it overlaps one ranked above it. Two different patches of the
/// same priority claiming the identical span is an error.
pub fn resolve_claims(mut claims: Vec<Claim>) -> Result<Resolution> {
    claims.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.range.start.cmp(&b.range.start))
            .then(b.range.end.cmp(&a.range.end))
            .then(a.patch.cmp(&b.patch))
    });

    for pair in claims.windows(2) {
        let (first, second) = (&pair[0], &pair[1]);
        if first.priority == second.priority
            && first.range == second.range
            && first.patch != second.patch
        {
            return Err(TranslateError::AmbiguousClaim {
                first: first.patch_name.to_string(),
                second: second.patch_name.to_string(),
                priority: first.priority,
                start: first.range.start,
                end: first.range.end,
            });
        }
    }

    let mut resolution = Resolution::default();
    for claim in claims {
        if resolution
            .accepted
            .iter()
            .any(|kept| overlaps(&kept.range, &claim.range))
        {
            resolution.lost.push(claim);
        } else {
            resolution.accepted.push(claim);
        }
    }
    resolution.accepted.sort_by_key(|claim| claim.range.start);

    Ok(resolution)
}

/// Replace every claimed span in one pass; claims must be sorted and disjoint
pub fn splice(source: &[u8], claims: &[Claim]) -> Vec<u8> {
    let mut out = Vec::with_capacity(source.len());
    let mut cursor = 0;

    for claim in claims {
        out.extend_from_slice(&source[cursor..claim.range.start]);
        out.extend_from_slice(&claim.replacement);
        cursor = claim.range.end;
    }
    out.extend_from_slice(&source[cursor..]);

    out
}
