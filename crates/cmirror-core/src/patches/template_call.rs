/*!
# Template Call

Patch   TemplateFunction<A, B>(...)
to      CONCAT(TemplateFunction, CONCAT(A, B))(...)
*/

use std::sync::Arc;

use crate::collector::{template_argument_texts, TemplateInstances};
use crate::patch::Patch;
use crate::syntax::{node_str, Captures};
use crate::Result;

use super::unchanged;

/// Points explicit template calls at the specialisation the macro emits
///
/// Calls to argument-deduction templates lose their argument list instead,
/// since those templates are emitted as ordinary functions.
pub struct TemplateCall {
    priority: u32,
    instances: Arc<TemplateInstances>,
}

impl TemplateCall {
    pub fn new(instances: Arc<TemplateInstances>) -> Self {
        Self {
            priority: 40,
            instances,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

impl Patch for TemplateCall {
    fn name(&self) -> &'static str {
        "TemplateCall"
    }

    fn description(&self) -> &'static str {
        "Rewrites explicit template function calls to the token-pasted specialisation symbol"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn search_pattern(&self) -> String {
        "(call_expression \
            function: (template_function \
                name: (identifier) @name \
                arguments: (template_argument_list) @args) @callee)"
            .to_string()
    }

    fn main_capture(&self) -> &'static str {
        "callee"
    }

    fn apply(&self, captures: &Captures<'_>, source: &[u8]) -> Result<Vec<u8>> {
        let (Some(name_node), Some(args_node)) = (captures.get("name"), captures.get("args")) else {
            return Ok(unchanged(captures, self.main_capture(), source));
        };

        let name = node_str(name_node, source)?;
        let Some(params) = self.instances.parameters(name) else {
            return Ok(unchanged(captures, self.main_capture(), source));
        };
        if self.instances.is_arg_deduction_only(name) {
            return Ok(name.as_bytes().to_vec());
        }

        let args = template_argument_texts(args_node, source)?;
        if args.len() != params.len() {
            return Ok(unchanged(captures, self.main_capture(), source));
        }

        Ok(TemplateInstances::macro_symbol(name, &args).into_bytes())
    }
}
