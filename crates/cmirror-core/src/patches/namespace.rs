/*!
# Namespace

Patch   namespace NS { CONTENT }
to      CONTENT
*/

use crate::patch::Patch;
use crate::syntax::{node_bytes, Captures};
use crate::Result;

use super::unchanged;

/// Flattens namespace blocks into their enclosing scope
///
/// Names that collide after flattening are not detected.
pub struct Namespace {
    priority: u32,
}

impl Namespace {
    pub fn new() -> Self {
        Self { priority: 20 }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl Patch for Namespace {
    fn name(&self) -> &'static str {
        "Namespace"
    }

    fn description(&self) -> &'static str {
        "Removes the namespace keyword and braces, keeping the declarations verbatim"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn search_pattern(&self) -> String {
        "(namespace_definition body: (declaration_list) @decl_list) @namespace_def".to_string()
    }

    fn main_capture(&self) -> &'static str {
        "namespace_def"
    }

    fn apply(&self, captures: &Captures<'_>, source: &[u8]) -> Result<Vec<u8>> {
        let Some(decl_list) = captures.get("decl_list") else {
            return Ok(unchanged(captures, self.main_capture(), source));
        };

        let body = node_bytes(decl_list, source);
        let body = body.strip_prefix(b"{").unwrap_or(body);
        let body = body.strip_suffix(b"}").unwrap_or(body);
        Ok(body.to_vec())
    }
}
