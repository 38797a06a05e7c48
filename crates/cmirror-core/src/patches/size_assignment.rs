/*!
# Size Assignment

Patch   Size = <value>
to      *Size = <value>

if Size is a reference parameter of the enclosing function.
*/

use tracing::debug;

use crate::patch::Patch;
use crate::syntax::{node_bytes, Captures};
use crate::Result;

use super::helpers::{declares_reference, find_ancestor, function_parameters, is_shadowed, rewrite_node_text};
use super::unchanged;

/// Dereferences writes to a reference parameter, which becomes a pointer in C
///
/// The parameter is resolved through the declarators of the enclosing
/// function, and a local declaration of the same name in an enclosing block
/// suppresses the rewrite.
pub struct SizeAssignment {
    priority: u32,
    identifier: String,
}

impl SizeAssignment {
    pub fn new() -> Self {
        Self {
            priority: 40,
            identifier: "Size".to_string(),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Rewrite assignments to another reference parameter name
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }
}

impl Default for SizeAssignment {
    fn default() -> Self {
        Self::new()
    }
}

impl Patch for SizeAssignment {
    fn name(&self) -> &'static str {
        "SizeAssignment"
    }

    fn description(&self) -> &'static str {
        "Turns assignments to a reference parameter into writes through a pointer"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn search_pattern(&self) -> String {
        format!(
            r#"(assignment_expression left: (identifier) @id (#eq? @id "{}")) @assign"#,
            self.identifier
        )
    }

    fn main_capture(&self) -> &'static str {
        "assign"
    }

    fn apply(&self, captures: &Captures<'_>, source: &[u8]) -> Result<Vec<u8>> {
        let (Some(assign), Some(id)) = (captures.get("assign"), captures.get("id")) else {
            return Ok(unchanged(captures, self.main_capture(), source));
        };

        let Some(function) = find_ancestor(assign, "function_definition") else {
            return Ok(node_bytes(assign, source).to_vec());
        };
        let Some(params) = function_parameters(function) else {
            return Ok(node_bytes(assign, source).to_vec());
        };

        let name = node_bytes(id, source);
        let mut cursor = params.walk();
        let is_reference = params
            .named_children(&mut cursor)
            .any(|param| declares_reference(param, name, source));

        if !is_reference {
            return Ok(node_bytes(assign, source).to_vec());
        }
        if is_shadowed(assign, function, name, source) {
            debug!(identifier = %self.identifier, "Assignment targets a shadowing local");
            return Ok(node_bytes(assign, source).to_vec());
        }

        let at = id.start_byte();
        Ok(rewrite_node_text(assign, source, vec![(at..at, b"*".to_vec())]))
    }
}
