/*!
# Template Collector

Whole-corpus pass that records, for every template function, the distinct
explicit argument lists it is referenced with. The result is an immutable
[`TemplateInstances`] snapshot shared with the patches that generate and
call the per-instance macro expansions.
*/

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use tracing::{debug, info, warn};
use tree_sitter::Node;

use crate::patches::helpers::find_ancestor;
use crate::syntax::{node_str, CppSyntax};
use crate::{Result, TranslateError};

const DECLARATION_PATTERN: &str = r#"
(template_declaration
  parameters: (template_parameter_list) @params
  (function_definition
    declarator: (function_declarator
      declarator: (identifier) @name)))

(template_declaration
  parameters: (template_parameter_list) @params
  (declaration
    declarator: (function_declarator
      declarator: (identifier) @name)))
"#;

const EXPLICIT_REFERENCE: usize = 0;

const REFERENCE_PATTERN: &str = r#"
(template_function
  name: (identifier) @name
  arguments: (template_argument_list) @args) @reference

(call_expression
  function: (identifier) @name) @call
"#;

/// Characters the `CONCAT` macro can paste into a single identifier
static PASTEABLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("token pattern is valid"));

/// Identifier tokens inside an argument's text
static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier pattern is valid"));

/// Substitution rounds for references made inside other templates
const MAX_DEPENDENT_ROUNDS: usize = 32;

/// Collector-specific error types
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    #[error(
        "Template collector has no reference for {name}. Make sure to add every source file \
         which uses this template function to the template search list, or declare it as a \
         template with argument deduction."
    )]
    MissingReference { name: String },

    #[error("Instantiations <{first}> and <{second}> of {name} both paste to the symbol {symbol}")]
    SymbolCollision {
        name: String,
        first: String,
        second: String,
        symbol: String,
    },
}

/// Argument list recorded at one explicit reference, e.g. `Foo<int, float>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateRefInstance {
    args: Vec<String>,
}

impl TemplateRefInstance {
    pub fn new<S: Into<String>>(args: impl IntoIterator<Item = S>) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Display for TemplateRefInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.args.join(", "))
    }
}

/// Read-only result of a collection run
#[derive(Debug, Clone, Default)]
pub struct TemplateInstances {
    declarations: IndexMap<String, Vec<String>>,
    refs: IndexMap<String, Vec<TemplateRefInstance>>,
    arg_deduction: IndexSet<String>,
}

impl TemplateInstances {
    /// Whether `name` is a template function declared somewhere in the corpus
    pub fn is_template(&self, name: &str) -> bool {
        self.declarations.contains_key(name)
    }

    /// Declared template-parameter names of `name`
    pub fn parameters(&self, name: &str) -> Option<&[String]> {
        self.declarations.get(name).map(Vec::as_slice)
    }

    /// Whether `name` is emitted as an ordinary function instead of a macro
    pub fn is_arg_deduction_only(&self, name: &str) -> bool {
        self.arg_deduction.contains(name)
    }

    /// Distinct instances of `name` in first-seen order
    pub fn instances(&self, name: &str) -> std::result::Result<&[TemplateRefInstance], CollectorError> {
        self.refs
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CollectorError::MissingReference {
                name: name.to_string(),
            })
    }

    /// Declared template names in discovery order
    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.declarations.keys().map(String::as_str)
    }

    /// Names flagged for argument deduction
    pub fn arg_deduction_names(&self) -> impl Iterator<Item = &str> {
        self.arg_deduction.iter().map(String::as_str)
    }

    /// Total number of distinct instances across all templates
    pub fn instance_count(&self) -> usize {
        self.refs.values().map(Vec::len).sum()
    }

    /// Name of the macro that stamps out specialisations of `name`
    pub fn macro_name(name: &str) -> String {
        format!("DEFINE_{name}")
    }

    /// Invocation of the generating macro, e.g. `DEFINE_Foo(int, float)`
    pub fn macro_call<S: AsRef<str>>(name: &str, args: &[S]) -> String {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        format!("{}({})", Self::macro_name(name), args.join(", "))
    }

    /// Token-pasted symbol, e.g. `CONCAT(Foo, CONCAT(int, float))`
    pub fn macro_symbol<S: AsRef<str>>(name: &str, args: &[S]) -> String {
        let Some((last, rest)) = args.split_last() else {
            return name.to_string();
        };

        let mut pasted = last.as_ref().to_string();
        for arg in rest.iter().rev() {
            pasted = format!("CONCAT({}, {pasted})", arg.as_ref());
        }
        format!("CONCAT({name}, {pasted})")
    }

    /// Identifier a `CONCAT` chain expands to (`a##_##b`)
    pub fn flattened_symbol<S: AsRef<str>>(name: &str, args: &[S]) -> String {
        let mut symbol = name.to_string();
        for arg in args {
            symbol.push('_');
            symbol.push_str(arg.as_ref());
        }
        symbol
    }

    fn verify_symbols(&self) -> std::result::Result<(), CollectorError> {
        for (name, instances) in &self.refs {
            if self.is_arg_deduction_only(name) {
                continue;
            }

            let mut symbols: IndexMap<String, &TemplateRefInstance> = IndexMap::new();
            for instance in instances {
                for arg in instance.args() {
                    if !PASTEABLE_TOKEN.is_match(arg) {
                        warn!(
                            template = %name,
                            argument = %arg,
                            "Template argument is not a single token; the pasted symbol will not be an identifier"
                        );
                    }
                }

                let symbol = Self::flattened_symbol(name, instance.args());
                if let Some(previous) = symbols.get(&symbol) {
                    return Err(CollectorError::SymbolCollision {
                        name: name.clone(),
                        first: previous.to_string(),
                        second: instance.to_string(),
                        symbol,
                    });
                }
                symbols.insert(symbol, instance);
            }
        }
        Ok(())
    }
}

/// Corpus-wide template instantiation collector
pub struct TemplateCollector {
    syntax: CppSyntax,
    arg_deduction: IndexSet<String>,
}

impl TemplateCollector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            syntax: CppSyntax::new()?,
            arg_deduction: IndexSet::new(),
        })
    }

    /// Templates to treat as argument-deduction only regardless of call sites
    pub fn with_arg_deduction<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.arg_deduction.extend(names.into_iter().map(Into::into));
        self
    }

    /// Read and collect every file in `paths`
    pub fn collect_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<TemplateInstances> {
        let mut corpus = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let bytes = std::fs::read(path).map_err(|e| TranslateError::io(path, e))?;
            corpus.push((path.display().to_string(), bytes));
        }
        self.collect(corpus)
    }

    /// Collect over labelled in-memory sources, in corpus order
    pub fn collect<L: Into<String>>(
        &mut self,
        corpus: impl IntoIterator<Item = (L, Vec<u8>)>,
    ) -> Result<TemplateInstances> {
        let mut units = Vec::new();
        for (label, bytes) in corpus {
            units.push((label.into(), self.syntax.parse(bytes)?));
        }

        let declaration_query = self.syntax.compile("TemplateCollector", DECLARATION_PATTERN)?;
        let reference_query = self.syntax.compile("TemplateCollector", REFERENCE_PATTERN)?;

        let mut declarations: IndexMap<String, Vec<String>> = IndexMap::new();
        for (label, unit) in &units {
            for captures in unit.query(&declaration_query) {
                let (Some(name), Some(params)) = (captures.get("name"), captures.get("params")) else {
                    continue;
                };
                let name = node_str(name, unit.source())?;
                let Some(params) = template_parameter_names(params, unit.source())? else {
                    debug!(file = %label, template = name, "Unsupported template parameter list");
                    continue;
                };

                match declarations.get(name) {
                    Some(known) if known.len() != params.len() => warn!(
                        file = %label,
                        template = name,
                        "Template redeclared with a different parameter count; keeping the first"
                    ),
                    Some(_) => {}
                    None => {
                        declarations.insert(name.to_string(), params);
                    }
                }
            }
        }

        let mut refs: IndexMap<String, Vec<TemplateRefInstance>> = IndexMap::new();
        let mut arg_deduction = self.arg_deduction.clone();
        let mut dependents = Vec::new();
        for (label, unit) in &units {
            let mut hits = unit.query(&reference_query);
            hits.sort_by_key(|captures| captures.get("name").map(|node| node.start_byte()));

            for captures in hits {
                let Some(name_node) = captures.get("name") else {
                    continue;
                };
                let name = node_str(name_node, unit.source())?;
                let Some(params) = declarations.get(name) else {
                    continue;
                };

                if captures.pattern_index() != EXPLICIT_REFERENCE {
                    if arg_deduction.insert(name.to_string()) {
                        debug!(file = %label, template = name, "Called without template arguments");
                    }
                    continue;
                }

                let Some(args_node) = captures.get("args") else {
                    continue;
                };
                let args = template_argument_texts(args_node, unit.source())?;
                if args.len() != params.len() {
                    warn!(
                        file = %label,
                        template = name,
                        expected = params.len(),
                        found = args.len(),
                        "Skipping reference with mismatched template argument count"
                    );
                    continue;
                }

                if let Some((enclosing, enclosing_params)) =
                    enclosing_template(name_node, unit.source())?
                {
                    if args.iter().any(|arg| mentions_any(arg, &enclosing_params)) {
                        if !declarations.contains_key(&enclosing) {
                            warn!(
                                file = %label,
                                template = name,
                                enclosing = %enclosing,
                                "Skipping reference that depends on an unsupported template"
                            );
                            continue;
                        }
                        let dependent = DependentReference {
                            enclosing,
                            enclosing_params,
                            callee: name.to_string(),
                            args,
                        };
                        if !dependents.contains(&dependent) {
                            dependents.push(dependent);
                        }
                        continue;
                    }
                }

                record(&mut refs, name, TemplateRefInstance::new(args));
            }
        }

        resolve_dependents(&dependents, &mut refs);

        let instances = TemplateInstances {
            declarations,
            refs,
            arg_deduction,
        };
        instances.verify_symbols()?;

        info!(
            files = units.len(),
            templates = instances.declarations.len(),
            instances = instances.instance_count(),
            deduction_only = instances.arg_deduction.len(),
            "Template collection finished"
        );

        Ok(instances)
    }
}

/// Reference inside a template body whose arguments use that template's parameters
#[derive(Debug, PartialEq, Eq)]
struct DependentReference {
    enclosing: String,
    enclosing_params: Vec<String>,
    callee: String,
    args: Vec<String>,
}

fn record(refs: &mut IndexMap<String, Vec<TemplateRefInstance>>, name: &str, instance: TemplateRefInstance) -> bool {
    let known = refs.entry(name.to_string()).or_default();
    if known.contains(&instance) {
        return false;
    }
    known.push(instance);
    true
}

/// Instantiate dependent references with every instance of their enclosing
/// template until no new instance appears
fn resolve_dependents(dependents: &[DependentReference], refs: &mut IndexMap<String, Vec<TemplateRefInstance>>) {
    if dependents.is_empty() {
        return;
    }

    for round in 0..MAX_DEPENDENT_ROUNDS {
        let mut added = false;
        for dependent in dependents {
            let Some(outer) = refs.get(&dependent.enclosing).cloned() else {
                continue;
            };
            for instance in &outer {
                let args = dependent
                    .args
                    .iter()
                    .map(|arg| substitute(arg, &dependent.enclosing_params, instance.args()));
                if record(refs, &dependent.callee, TemplateRefInstance::new(args)) {
                    added = true;
                }
            }
        }

        if !added {
            debug!(rounds = round + 1, "Dependent template references resolved");
            return;
        }
    }

    warn!(
        rounds = MAX_DEPENDENT_ROUNDS,
        "Dependent template references keep producing new instances; stopping"
    );
}

/// Whether `arg` names any of `params` as a whole identifier
fn mentions_any(arg: &str, params: &[String]) -> bool {
    IDENTIFIER
        .find_iter(arg)
        .any(|token| params.iter().any(|param| param == token.as_str()))
}

/// `arg` with every identifier naming a parameter replaced by its value
fn substitute(arg: &str, params: &[String], values: &[String]) -> String {
    IDENTIFIER
        .replace_all(arg, |token: &regex::Captures<'_>| {
            let token = &token[0];
            params
                .iter()
                .position(|param| param == token)
                .and_then(|index| values.get(index))
                .map_or_else(|| token.to_string(), Clone::clone)
        })
        .into_owned()
}

/// Name and parameters of the closest template function declaration around `node`
///
/// Parameters are empty when the list cannot become macro parameters, in
/// which case no argument is considered dependent.
fn enclosing_template(node: Node<'_>, source: &[u8]) -> Result<Option<(String, Vec<String>)>> {
    let Some(template) = find_ancestor(node, "template_declaration") else {
        return Ok(None);
    };

    let mut cursor = template.walk();
    let function = template
        .named_children(&mut cursor)
        .find(|child| matches!(child.kind(), "function_definition" | "declaration"));
    let Some(declarator) = function.and_then(|function| function.child_by_field_name("declarator")) else {
        return Ok(None);
    };
    let Some(name) = declarator
        .child_by_field_name("declarator")
        .filter(|name| declarator.kind() == "function_declarator" && name.kind() == "identifier")
    else {
        return Ok(None);
    };

    let params = match template.child_by_field_name("parameters") {
        Some(list) => template_parameter_names(list, source)?.unwrap_or_default(),
        None => Vec::new(),
    };
    Ok(Some((node_str(name, source)?.to_string(), params)))
}

/// Names declared by a `template<…>` parameter list
///
/// Returns `None` for lists this translator cannot express as macro
/// parameters: empty lists, variadic packs and template template parameters.
pub(crate) fn template_parameter_names(list: Node<'_>, source: &[u8]) -> Result<Option<Vec<String>>> {
    let mut names = Vec::new();
    let mut cursor = list.walk();

    for param in list.named_children(&mut cursor) {
        let name = match param.kind() {
            "comment" => continue,
            "type_parameter_declaration" => {
                let mut inner = param.walk();
                let found = param
                    .named_children(&mut inner)
                    .find(|child| child.kind() == "type_identifier");
                found
            }
            "optional_type_parameter_declaration" => param.child_by_field_name("name"),
            "parameter_declaration" | "optional_parameter_declaration" => param
                .child_by_field_name("declarator")
                .filter(|declarator| declarator.kind() == "identifier"),
            _ => None,
        };

        match name {
            Some(node) => names.push(node_str(node, source)?.to_string()),
            None => return Ok(None),
        }
    }

    Ok((!names.is_empty()).then_some(names))
}

/// Trimmed text of every argument in a `<…>` argument list
pub(crate) fn template_argument_texts(list: Node<'_>, source: &[u8]) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut cursor = list.walk();

    for arg in list.named_children(&mut cursor) {
        if arg.kind() == "comment" {
            continue;
        }
        args.push(node_str(arg, source)?.trim().to_string());
    }

    Ok(args)
}
