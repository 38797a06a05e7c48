/*!
# Template Definition

Patch   template<A, B>
        RET_TYPE TemplateFunction(...) {...}

to      #define DEFINE_TemplateFunction(A, B) \
        RET_TYPE CONCAT(TemplateFunction, CONCAT(A, B))(...) {...}
        DEFINE_TemplateFunction(int, float);
        DEFINE_TemplateFunction(int, int);

with one invocation per distinct instance the collector recorded.
*/

use std::sync::Arc;

use indexmap::IndexSet;
use tracing::debug;

use crate::collector::{template_parameter_names, TemplateInstances};
use crate::patch::Patch;
use crate::syntax::{node_bytes, node_str, Captures};
use crate::Result;

use super::helpers::{line_comment_ranges, rewrite_node_text};
use super::unchanged;

/// Expands template functions into a generating macro plus its instantiations
pub struct TemplateDefinition {
    priority: u32,
    instances: Arc<TemplateInstances>,
}

impl TemplateDefinition {
    pub fn new(instances: Arc<TemplateInstances>) -> Self {
        Self {
            priority: 10,
            instances,
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

/// Join every line into one logical preprocessor line
fn continue_lines(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() + text.len() / 16);
    for &byte in text {
        if byte == b'\n' {
            out.extend_from_slice(b" \\\n");
        } else {
            out.push(byte);
        }
    }
    out
}

impl Patch for TemplateDefinition {
    fn name(&self) -> &'static str {
        "TemplateDefinition"
    }

    fn description(&self) -> &'static str {
        "Turns a template function into a generating macro and one invocation per collected instance"
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn search_pattern(&self) -> String {
        r#"
(template_declaration
  parameters: (template_parameter_list) @templ_params
  (function_definition
    type: [(type_identifier) (primitive_type) (sized_type_specifier)] @type_id
    declarator: (function_declarator
      declarator: (identifier) @fcn_name
      parameters: (parameter_list) @fcn_params)
    body: (compound_statement) @compound) @fcn_def) @template_def
"#
        .to_string()
    }

    fn main_capture(&self) -> &'static str {
        "template_def"
    }

    fn apply(&self, captures: &Captures<'_>, source: &[u8]) -> Result<Vec<u8>> {
        let (Some(params_node), Some(name_node), Some(function)) = (
            captures.get("templ_params"),
            captures.get("fcn_name"),
            captures.get("fcn_def"),
        ) else {
            return Ok(unchanged(captures, self.main_capture(), source));
        };

        let name = node_str(name_node, source)?;
        if self.instances.is_arg_deduction_only(name) {
            return Ok(node_bytes(function, source).to_vec());
        }

        let Some(params) = template_parameter_names(params_node, source)? else {
            debug!(template = name, "Template parameter list cannot become macro parameters");
            return Ok(unchanged(captures, self.main_capture(), source));
        };
        let instances = self.instances.instances(name)?;

        let mut edits: Vec<_> = line_comment_ranges(function, source)
            .into_iter()
            .map(|range| (range, Vec::new()))
            .collect();
        edits.push((
            name_node.byte_range(),
            TemplateInstances::macro_symbol(name, &params).into_bytes(),
        ));

        let mut definition = format!(
            "#define {}({})\n",
            TemplateInstances::macro_name(name),
            params.join(", ")
        )
        .into_bytes();
        definition.extend_from_slice(&rewrite_node_text(function, source, edits));

        let mut out = continue_lines(&definition);
        let mut emitted = IndexSet::new();
        for instance in instances {
            let call = format!("{};", TemplateInstances::macro_call(name, instance.args()));
            if emitted.insert(call.clone()) {
                out.push(b'\n');
                out.extend_from_slice(call.as_bytes());
            }
        }

        Ok(out)
    }
}
