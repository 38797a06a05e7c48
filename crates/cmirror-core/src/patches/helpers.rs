//! Tree navigation and text surgery shared by the patches.

use std::ops::Range;

use tree_sitter::Node;

use crate::syntax::node_bytes;

/// Closest ancestor of `node` with the given kind
pub fn find_ancestor<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(candidate) = current {
        if candidate.kind() == kind {
            return Some(candidate);
        }
        current = candidate.parent();
    }
    None
}

/// Parameter list of a function definition, looking through pointer and
/// reference return declarators
pub fn function_parameters(function: Node<'_>) -> Option<Node<'_>> {
    let mut declarator = function.child_by_field_name("declarator")?;
    loop {
        if declarator.kind() == "function_declarator" {
            return declarator.child_by_field_name("parameters");
        }
        declarator = declarator
            .child_by_field_name("declarator")
            .or_else(|| declarator.named_child(0))?;
    }
}

/// Identifier a declarator ultimately names (`x` in `*x`, `&x`, `x = 1`, `x[4]`)
pub fn declarator_identifier(declarator: Node<'_>) -> Option<Node<'_>> {
    let mut current = declarator;
    loop {
        match current.kind() {
            "identifier" => return Some(current),
            "function_declarator" => return None,
            _ => {
                current = current
                    .child_by_field_name("declarator")
                    .or_else(|| current.named_child(0))?;
            }
        }
    }
}

/// Whether `param` declares `name` as a reference (`T &name`, `T &&name`,
/// `T *&name`)
pub fn declares_reference(param: Node<'_>, name: &[u8], source: &[u8]) -> bool {
    let Some(mut current) = param.child_by_field_name("declarator") else {
        return false;
    };

    let mut reference = false;
    loop {
        match current.kind() {
            "identifier" => return reference && node_bytes(current, source) == name,
            "function_declarator" => return false,
            "reference_declarator" => reference = true,
            _ => {}
        }
        let Some(next) = current
            .child_by_field_name("declarator")
            .or_else(|| current.named_child(0))
        else {
            return false;
        };
        current = next;
    }
}

/// Whether a `declaration` node declares `name`
fn declaration_declares(declaration: Node<'_>, name: &[u8], source: &[u8]) -> bool {
    let mut cursor = declaration.walk();
    let declares = declaration
        .children_by_field_name("declarator", &mut cursor)
        .filter_map(declarator_identifier)
        .any(|identifier| node_bytes(identifier, source) == name);
    declares
}

/// Whether a local declaration of `name` in a block enclosing `node` (below
/// `scope_root`) comes before `node` and hides an outer `name`
pub fn is_shadowed(node: Node<'_>, scope_root: Node<'_>, name: &[u8], source: &[u8]) -> bool {
    let mut current = node.parent();
    while let Some(scope) = current {
        if scope.id() == scope_root.id() {
            break;
        }

        match scope.kind() {
            "compound_statement" => {
                let mut cursor = scope.walk();
                let shadowed = scope.named_children(&mut cursor).any(|child| {
                    child.kind() == "declaration"
                        && child.end_byte() <= node.start_byte()
                        && declaration_declares(child, name, source)
                });
                if shadowed {
                    return true;
                }
            }
            "for_statement" => {
                let shadowed = scope
                    .child_by_field_name("initializer")
                    .is_some_and(|init| {
                        init.kind() == "declaration" && declaration_declares(init, name, source)
                    });
                if shadowed {
                    return true;
                }
            }
            _ => {}
        }
        current = scope.parent();
    }
    false
}

/// Ranges of every `//` comment under `node`, widened over the blanks before it
pub fn line_comment_ranges(node: Node<'_>, source: &[u8]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    collect_line_comments(node, node.start_byte(), source, &mut ranges);
    ranges
}

fn collect_line_comments(node: Node<'_>, floor: usize, source: &[u8], ranges: &mut Vec<Range<usize>>) {
    if node.kind() == "comment" {
        if node_bytes(node, source).starts_with(b"//") {
            let mut start = node.start_byte();
            while start > floor && matches!(source[start - 1], b' ' | b'\t') {
                start -= 1;
            }
            ranges.push(start..node.end_byte());
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_line_comments(child, floor, source, ranges);
    }
}

/// Text of `node` with each edit range (absolute offsets, disjoint) replaced
pub fn rewrite_node_text(node: Node<'_>, source: &[u8], mut edits: Vec<(Range<usize>, Vec<u8>)>) -> Vec<u8> {
    edits.sort_by_key(|(range, _)| range.start);

    let mut out = Vec::with_capacity(node.byte_range().len());
    let mut cursor = node.start_byte();
    for (range, replacement) in edits {
        if range.start < cursor || range.end > node.end_byte() {
            continue;
        }
        out.extend_from_slice(&source[cursor..range.start]);
        out.extend_from_slice(&replacement);
        cursor = range.end;
    }
    out.extend_from_slice(&source[cursor..node.end_byte()]);

    out
}
