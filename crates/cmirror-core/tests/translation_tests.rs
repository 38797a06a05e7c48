/*!
# Translation Engine Integration Tests

Patches driven through the engine over real C++ snippets.
*/

use std::sync::Arc;

use cmirror_core::patches::{Namespace, SizeAssignment, TemplateCall, TemplateDefinition, UsingDeclaration};
use cmirror_core::{CollectorError, Patch, TemplateCollector, TemplateInstances, TranslateError, TranslationEngine};
use pretty_assertions::assert_eq;

fn translate(patches: Vec<Box<dyn Patch>>, source: &str) -> anyhow::Result<String> {
    let mut engine = TranslationEngine::with_patches(patches)?;
    let output = engine.translate(source.as_bytes().to_vec())?;
    Ok(String::from_utf8(output)?)
}

fn collect(files: &[(&str, &str)]) -> anyhow::Result<Arc<TemplateInstances>> {
    let corpus = files
        .iter()
        .map(|(label, text)| (label.to_string(), text.as_bytes().to_vec()));
    Ok(Arc::new(TemplateCollector::new()?.collect(corpus)?))
}

fn template_patches(instances: &Arc<TemplateInstances>) -> Vec<Box<dyn Patch>> {
    vec![
        Box::new(TemplateCall::new(Arc::clone(instances))),
        Box::new(TemplateDefinition::new(Arc::clone(instances))),
    ]
}

#[test]
fn test_namespace_is_flattened() -> anyhow::Result<()> {
    let output = translate(vec![Box::new(Namespace::new())], "namespace NS { int a; int b; }")?;

    assert_eq!(output, " int a; int b; ");
    assert_eq!(output.trim(), "int a; int b;");
    Ok(())
}

#[test]
fn test_namespace_is_idempotent() -> anyhow::Result<()> {
    let once = translate(
        vec![Box::new(Namespace::new())],
        "namespace A {\nnamespace B {\nint x;\n}\nint y;\n}\n",
    )?;
    let twice = translate(vec![Box::new(Namespace::new())], &once)?;

    assert!(!once.contains("namespace"));
    assert!(once.contains("int x;"));
    assert!(once.find("int x;") < once.find("int y;"));
    assert_eq!(once, twice);
    Ok(())
}

#[test]
fn test_using_declarations_are_removed() -> anyhow::Result<()> {
    let output = translate(
        vec![Box::new(UsingDeclaration::new())],
        "using namespace llvm;\nint a;\n",
    )?;

    assert_eq!(output, "\nint a;\n");
    Ok(())
}

#[test]
fn test_size_reference_assignment_is_dereferenced() -> anyhow::Result<()> {
    let output = translate(
        vec![Box::new(SizeAssignment::new())],
        "void f(int &Size) {\n  Size = 5;\n}\n",
    )?;

    assert_eq!(output, "void f(int &Size) {\n  *Size = 5;\n}\n");
    Ok(())
}

#[test]
fn test_size_value_parameter_is_unchanged() -> anyhow::Result<()> {
    let source = "void f(int Size) {\n  Size = 5;\n}\n";
    let output = translate(vec![Box::new(SizeAssignment::new())], source)?;

    assert_eq!(output, source);
    Ok(())
}

#[test]
fn test_size_shadowed_by_local_is_unchanged() -> anyhow::Result<()> {
    let source = "void f(int &Size) {\n  {\n    int Size = 0;\n    Size = 5;\n  }\n}\n";
    let output = translate(vec![Box::new(SizeAssignment::new())], source)?;

    assert_eq!(output, source);
    Ok(())
}

#[test]
fn test_size_write_after_shadowing_block_is_dereferenced() -> anyhow::Result<()> {
    let output = translate(
        vec![Box::new(SizeAssignment::new())],
        "void f(int &Size) {\n  {\n    int Size = 0;\n  }\n  Size = 5;\n}\n",
    )?;

    assert!(output.contains("  *Size = 5;"));
    assert!(output.contains("int Size = 0;"));
    Ok(())
}

#[test]
fn test_size_assignment_for_other_identifier() -> anyhow::Result<()> {
    let output = translate(
        vec![Box::new(SizeAssignment::new().with_identifier("Len"))],
        "void f(unsigned &Len, int Size) {\n  Len = 2;\n  Size = 3;\n}\n",
    )?;

    assert_eq!(output, "void f(unsigned &Len, int Size) {\n  *Len = 2;\n  Size = 3;\n}\n");
    Ok(())
}

#[test]
fn test_size_pointer_reference_is_dereferenced() -> anyhow::Result<()> {
    let output = translate(
        vec![Box::new(SizeAssignment::new())],
        "void f(uint8_t *&Size) {\n  Size = 0;\n}\n",
    )?;

    assert_eq!(output, "void f(uint8_t *&Size) {\n  *Size = 0;\n}\n");
    Ok(())
}

#[test]
fn test_size_pointer_parameter_is_unchanged() -> anyhow::Result<()> {
    let source = "void f(uint8_t *Size) {\n  Size = 0;\n}\n";
    let output = translate(vec![Box::new(SizeAssignment::new())], source)?;

    assert_eq!(output, source);
    Ok(())
}

#[test]
fn test_size_shadowed_by_for_initializer_is_unchanged() -> anyhow::Result<()> {
    let source = "\
void f(int &Size) {
  for (int Size = 0; Size < 4; ++Size) {
    Size = 2;
  }
  Size = 5;
}
";
    let output = translate(vec![Box::new(SizeAssignment::new())], source)?;

    assert!(output.contains("    Size = 2;\n"));
    assert!(output.contains("  *Size = 5;\n"));
    assert!(output.contains("for (int Size = 0;"));
    Ok(())
}

const FOO_WITH_CALLS: &str = "\
template<typename A, typename B>
void Foo(A a, B b) {
  return;
}

void use(void) {
  Foo<int, float>(1, 2.0);
  Foo<int, int>(1, 2);
  Foo<int, float>(3, 4.0);
}
";

#[test]
fn test_template_definition_emits_macro_and_distinct_instances() -> anyhow::Result<()> {
    let instances = collect(&[("foo.cpp", FOO_WITH_CALLS)])?;
    let output = translate(template_patches(&instances), FOO_WITH_CALLS)?;

    let expected = "\
#define DEFINE_Foo(A, B) \\
void CONCAT(Foo, CONCAT(A, B))(A a, B b) { \\
  return; \\
}
DEFINE_Foo(int, float);
DEFINE_Foo(int, int);

void use(void) {
  CONCAT(Foo, CONCAT(int, float))(1, 2.0);
  CONCAT(Foo, CONCAT(int, int))(1, 2);
  CONCAT(Foo, CONCAT(int, float))(3, 4.0);
}
";
    assert_eq!(output, expected);
    Ok(())
}

#[test]
fn test_instantiation_count_matches_collector() -> anyhow::Result<()> {
    let instances = collect(&[("foo.cpp", FOO_WITH_CALLS)])?;
    let output = translate(template_patches(&instances), FOO_WITH_CALLS)?;

    let invocations = output
        .lines()
        .filter(|line| line.starts_with("DEFINE_Foo(") && line.ends_with(");"))
        .count();
    assert_eq!(invocations, instances.instances("Foo")?.len());
    assert_eq!(invocations, 2);
    assert_eq!(output.matches("DEFINE_Foo(int, float);").count(), 1);
    Ok(())
}

#[test]
fn test_template_called_from_template_is_instantiated_concretely() -> anyhow::Result<()> {
    let source = "\
template<typename T>
void Foo(T v) {
}
template<typename U>
void Bar(U u) {
  Foo<U>(u);
}
void g(void) {
  Bar<int>(1);
}
";
    let instances = collect(&[("nested.cpp", source)])?;
    let output = translate(template_patches(&instances), source)?;

    assert!(output.contains("\nDEFINE_Foo(int);"));
    assert!(output.contains("\nDEFINE_Bar(int);"));
    assert!(output.contains("  CONCAT(Foo, U)(u); \\\n"));
    assert!(output.contains("  CONCAT(Bar, int)(1);\n"));
    assert!(!output.contains("DEFINE_Foo(U);"));
    Ok(())
}

#[test]
fn test_deduction_only_template_is_plain_function() -> anyhow::Result<()> {
    let source = "\
template<typename A, typename B>
void Foo(A a, B b) {
  return;
}

void use(void) {
  Foo(1, 2.0);
}
";
    let instances = collect(&[("foo.cpp", source)])?;
    let output = translate(template_patches(&instances), source)?;

    let expected = "\
void Foo(A a, B b) {
  return;
}

void use(void) {
  Foo(1, 2.0);
}
";
    assert_eq!(output, expected);
    assert!(!output.contains("DEFINE_"));
    Ok(())
}

#[test]
fn test_deduction_bypass_ignores_explicit_instances_elsewhere() -> anyhow::Result<()> {
    let definition = "\
template<typename A, typename B>
void Foo(A a, B b) {
  return;
}
";
    let deduced_caller = "void one(void) {\n  Foo(1, 2.0);\n}\n";
    let explicit_caller = "void two(void) {\n  Foo<int, int>(1, 2);\n}\n";
    let instances = collect(&[
        ("foo.cpp", definition),
        ("one.cpp", deduced_caller),
        ("two.cpp", explicit_caller),
    ])?;

    assert!(instances.is_arg_deduction_only("Foo"));
    assert_eq!(instances.instances("Foo")?.len(), 1);

    let output = translate(template_patches(&instances), definition)?;
    assert_eq!(output, "void Foo(A a, B b) {\n  return;\n}\n");

    let caller = translate(template_patches(&instances), explicit_caller)?;
    assert_eq!(caller, "void two(void) {\n  Foo(1, 2);\n}\n");
    Ok(())
}

#[test]
fn test_configured_deduction_needs_no_call_sites() -> anyhow::Result<()> {
    let source = "template<typename T>\nT id(T v) {\n  return v;\n}\n";
    let instances = Arc::new(
        TemplateCollector::new()?
            .with_arg_deduction(["id"])
            .collect([("id.cpp", source.as_bytes().to_vec())])?,
    );

    let output = translate(template_patches(&instances), source)?;
    assert_eq!(output, "T id(T v) {\n  return v;\n}\n");
    Ok(())
}

#[test]
fn test_missing_instances_abort_translation() -> anyhow::Result<()> {
    let source = "template<typename T>\nvoid Unused(T v) {\n}\n";
    let instances = collect(&[("unused.cpp", source)])?;

    let mut engine = TranslationEngine::with_patches(template_patches(&instances))?;
    match engine.translate(source.as_bytes().to_vec()) {
        Err(TranslateError::Collector(CollectorError::MissingReference { name })) => {
            assert_eq!(name, "Unused");
        }
        other => panic!("Expected MissingReference, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_line_comments_are_stripped_from_macro_body() -> anyhow::Result<()> {
    let source = "\
template<typename T>
T twice(T v) {
  // double it
  return v + v; // sum
}
int main(void) { return twice<int>(2); }
";
    let instances = collect(&[("twice.cpp", source)])?;
    let output = translate(template_patches(&instances), source)?;

    assert!(!output.contains("//"));
    assert!(output.starts_with("#define DEFINE_twice(T) \\\nT CONCAT(twice, T)(T v) { \\\n"));
    assert!(output.contains("  return v + v; \\\n}\nDEFINE_twice(int);\n"));
    assert!(output.contains("return CONCAT(twice, int)(2);"));
    Ok(())
}

#[test]
fn test_storage_class_is_kept_in_macro() -> anyhow::Result<()> {
    let source = "\
template<typename T>
static inline T id(T v) { return v; }
int g(void) { return id<int>(1); }
";
    let instances = collect(&[("id.cpp", source)])?;
    let output = translate(template_patches(&instances), source)?;

    assert!(output.contains("static inline T CONCAT(id, T)(T v) { return v; }\nDEFINE_id(int);"));
    Ok(())
}

#[test]
fn test_calls_to_unknown_templates_are_untouched() -> anyhow::Result<()> {
    let source = "void f(void) {\n  g<int>(1);\n}\n";
    let instances = collect(&[("f.cpp", source)])?;
    let output = translate(template_patches(&instances), source)?;

    assert_eq!(output, source);
    Ok(())
}

#[test]
fn test_expression_patches_run_inside_namespaces_and_templates() -> anyhow::Result<()> {
    let source = "\
namespace llvm {
template<typename T>
static void setSize(T Value, int &Size) {
  Size = sizeof(T);
}
}
void call(int &n) {
  setSize<char>('a', n);
}
";
    let instances = collect(&[("size.cpp", source)])?;
    let patches: Vec<Box<dyn Patch>> = vec![
        Box::new(SizeAssignment::new()),
        Box::new(TemplateCall::new(Arc::clone(&instances))),
        Box::new(UsingDeclaration::new()),
        Box::new(Namespace::new()),
        Box::new(TemplateDefinition::new(Arc::clone(&instances))),
    ];
    let output = translate(patches, source)?;

    assert!(!output.contains("namespace"));
    assert!(!output.contains("template<"));
    assert!(output.contains("*Size = sizeof(T); \\\n}\nDEFINE_setSize(char);"));
    assert!(output.contains("CONCAT(setSize, char)('a', n);"));
    Ok(())
}

#[test]
fn test_translation_is_deterministic() -> anyhow::Result<()> {
    let instances = collect(&[("foo.cpp", FOO_WITH_CALLS)])?;

    let first = translate(template_patches(&instances), FOO_WITH_CALLS)?;
    let second = translate(template_patches(&instances), FOO_WITH_CALLS)?;
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_stats_track_applications_and_conflicts() -> anyhow::Result<()> {
    let mut engine = TranslationEngine::with_patches(vec![
        Box::new(SizeAssignment::new()),
        Box::new(Namespace::new()),
    ])?;
    engine.translate(b"namespace N {\nvoid f(int &Size) { Size = 1; }\n}\n".to_vec())?;

    let namespace = &engine.stats()["Namespace"];
    assert_eq!(namespace.applied, 1);
    assert_eq!(namespace.conflicts_lost, 1);

    let size = &engine.stats()["SizeAssignment"];
    assert_eq!(size.applied, 1);
    assert_eq!(engine.patch_names(), vec!["SizeAssignment", "Namespace"]);
    Ok(())
}

#[test]
fn test_iteration_limit_is_reported() -> anyhow::Result<()> {
    let mut engine = TranslationEngine::with_patches(vec![Box::new(Namespace::new())])?.max_iterations(1);

    let result = engine.translate(b"namespace A { namespace B { int x; } }".to_vec());
    assert!(matches!(result, Err(TranslateError::IterationLimit(1))));
    Ok(())
}
