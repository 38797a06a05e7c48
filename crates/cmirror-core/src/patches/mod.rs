/*!
# C++ to C Patches

Concrete rewrite rules. Expression-level patches carry higher default
priorities than the structural ones, so they run before their surroundings
are folded into macro bodies the parser no longer looks into.
*/

pub mod helpers;
pub mod namespace;
pub mod size_assignment;
pub mod template_call;
pub mod template_definition;
pub mod using_declaration;

// Re-export commonly used patches
pub use namespace::Namespace;
pub use size_assignment::SizeAssignment;
pub use template_call::TemplateCall;
pub use template_definition::TemplateDefinition;
pub use using_declaration::UsingDeclaration;

use crate::syntax::{node_bytes, Captures};

/// Text of the main capture, returned when a match does not warrant a rewrite
pub(crate) fn unchanged(captures: &Captures<'_>, main_capture: &str, source: &[u8]) -> Vec<u8> {
    captures
        .get(main_capture)
        .map(|node| node_bytes(node, source).to_vec())
        .unwrap_or_default()
}
