/*!
# Syntax Layer

Thin wrapper over tree-sitter and its C++ grammar. A [`SourceUnit`] owns the
bytes of one file together with the tree parsed from them; queries run
against the unit and hand back [`Captures`] whose nodes borrow the unit.
*/

use std::ops::Range;

use tracing::debug;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, StreamingIterator, Tree};

use crate::{Result, TranslateError};

/// C++ parser and pattern compiler
pub struct CppSyntax {
    parser: Parser,
    language: Language,
}

impl CppSyntax {
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_cpp::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&language)?;

        Ok(Self { parser, language })
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Compile a search pattern; `owner` names the patch in the error
    pub fn compile(&self, owner: &str, pattern: &str) -> Result<Query> {
        Query::new(&self.language, pattern).map_err(|source| TranslateError::Query {
            patch: owner.to_string(),
            source,
        })
    }

    /// Parse bytes into a fresh source unit
    pub fn parse(&mut self, source: Vec<u8>) -> Result<SourceUnit> {
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| TranslateError::Parse("parser returned no tree".to_string()))?;

        if tree.root_node().has_error() {
            debug!("Source contains syntax errors; untouched regions are copied verbatim");
        }

        Ok(SourceUnit { source, tree })
    }
}

/// A file's bytes plus the tree derived from them
pub struct SourceUnit {
    source: Vec<u8>,
    tree: Tree,
}

impl SourceUnit {
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn into_source(self) -> Vec<u8> {
        self.source
    }

    /// Run a compiled query over the whole unit, in match order
    pub fn query<'a>(&'a self, query: &'a Query) -> Vec<Captures<'a>> {
        let names = query.capture_names();
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, self.tree.root_node(), self.source.as_slice());

        let mut found = Vec::new();
        while let Some(m) = matches.next() {
            let entries = m
                .captures
                .iter()
                .map(|capture| Capture {
                    name: names[capture.index as usize],
                    node: capture.node,
                })
                .collect();
            found.push(Captures {
                pattern_index: m.pattern_index,
                entries,
            });
        }
        found
    }
}

/// A node bound to a capture name
#[derive(Debug, Clone, Copy)]
pub struct Capture<'a> {
    pub name: &'a str,
    pub node: Node<'a>,
}

impl Capture<'_> {
    pub fn range(&self) -> Range<usize> {
        self.node.byte_range()
    }
}

/// All captures of one pattern match, in the order the query engine reports them
#[derive(Debug, Clone)]
pub struct Captures<'a> {
    pattern_index: usize,
    entries: Vec<Capture<'a>>,
}

impl<'a> Captures<'a> {
    /// Index of the pattern (inside a multi-pattern query) that matched
    pub fn pattern_index(&self) -> usize {
        self.pattern_index
    }

    /// First node bound to `name`
    pub fn get(&self, name: &str) -> Option<Node<'a>> {
        self.entries
            .iter()
            .find(|capture| capture.name == name)
            .map(|capture| capture.node)
    }

    /// Every node bound to `name`; quantified captures can bind several
    pub fn all<'s>(&'s self, name: &'s str) -> impl Iterator<Item = Node<'a>> + 's {
        self.entries
            .iter()
            .filter(move |capture| capture.name == name)
            .map(|capture| capture.node)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capture<'a>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bytes covered by a node
pub fn node_bytes<'s>(node: Node<'_>, source: &'s [u8]) -> &'s [u8] {
    &source[node.byte_range()]
}

/// Text covered by a node, which must be UTF-8
pub fn node_str<'s>(node: Node<'_>, source: &'s [u8]) -> Result<&'s str> {
    Ok(std::str::from_utf8(node_bytes(node, source))?)
}
