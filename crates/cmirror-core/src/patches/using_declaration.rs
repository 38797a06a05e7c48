/*!
# Using Declaration

Patch   using namespace NS;
        using NS::name;
to      (nothing)
*/

use crate::patch::Patch;
use crate::syntax::Captures;
use crate::Result;

/// Drops `using` declarations, which only matter for name lookup in C++
pub struct UsingDeclaration {
    priority: u32,
}

impl UsingDeclaration {
    pub fn new() -> Self {
        Self { priority: 30 }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

impl Default for UsingDeclaration {
    fn default() -> Self {
        Self::new()
    }
}

impl Patch for UsingDeclaration {
    fn name(&self) -> &'static str {
        "UsingDeclaration"
    }

    fn description(&self) -> &'static str {
        "Removes using-namespace and using-name declarations"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn search_pattern(&self) -> String {
        "(using_declaration) @using".to_string()
    }

    fn main_capture(&self) -> &'static str {
        "using"
    }

    fn apply(&self, _captures: &Captures<'_>, _source: &[u8]) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }
}
