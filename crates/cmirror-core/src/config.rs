/*!
# Configuration

JSON description of one translation run: which files to rewrite, which files
the template collector must scan, and which patches apply at what priority.

```json
{
  "files_to_translate": [{ "in": "src/Printer.cpp", "out": "out/Printer.c" }],
  "files_for_template_search": ["src/Decoder.cpp"],
  "templates_with_arg_deduction": ["printOperand"],
  "patches": [{ "name": "TemplateDefinition", "priority": 10 }],
  "max_iterations": 64
}
```
*/

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::collector::TemplateInstances;
use crate::patch::Patch;
use crate::patches::{Namespace, SizeAssignment, TemplateCall, TemplateDefinition, UsingDeclaration};
use crate::{Result, TranslateError};

fn default_max_iterations() -> usize {
    64
}

/// Patches the translator knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PatchKind {
    Namespace,
    UsingDeclaration,
    SizeAssignment,
    TemplateCall,
    TemplateDefinition,
}

impl PatchKind {
    /// Every patch, in the order of the default set
    pub const ALL: [PatchKind; 5] = [
        PatchKind::SizeAssignment,
        PatchKind::TemplateCall,
        PatchKind::UsingDeclaration,
        PatchKind::Namespace,
        PatchKind::TemplateDefinition,
    ];

    pub fn default_priority(self) -> u32 {
        match self {
            PatchKind::SizeAssignment | PatchKind::TemplateCall => 40,
            PatchKind::UsingDeclaration => 30,
            PatchKind::Namespace => 20,
            PatchKind::TemplateDefinition => 10,
        }
    }

    /// Instantiate the patch; template patches share the collector snapshot
    pub fn build(self, priority: u32, instances: &Arc<TemplateInstances>) -> Box<dyn Patch> {
        match self {
            PatchKind::Namespace => Box::new(Namespace::new().with_priority(priority)),
            PatchKind::UsingDeclaration => Box::new(UsingDeclaration::new().with_priority(priority)),
            PatchKind::SizeAssignment => Box::new(SizeAssignment::new().with_priority(priority)),
            PatchKind::TemplateCall => {
                Box::new(TemplateCall::new(Arc::clone(instances)).with_priority(priority))
            }
            PatchKind::TemplateDefinition => {
                Box::new(TemplateDefinition::new(Arc::clone(instances)).with_priority(priority))
            }
        }
    }
}

/// One patch entry of the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchConfig {
    pub name: PatchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl PatchConfig {
    pub fn priority(&self) -> u32 {
        self.priority.unwrap_or_else(|| self.name.default_priority())
    }
}

/// Input file and where its translation goes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMapping {
    #[serde(rename = "in")]
    pub input: PathBuf,
    #[serde(rename = "out")]
    pub output: PathBuf,
}

/// Translation run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranslatorConfig {
    pub files_to_translate: Vec<FileMapping>,
    #[serde(default)]
    pub files_for_template_search: Vec<PathBuf>,
    #[serde(default)]
    pub templates_with_arg_deduction: Vec<String>,
    #[serde(default)]
    pub patches: Vec<PatchConfig>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl TranslatorConfig {
    /// Parse and validate a configuration; paths are kept as written
    pub fn from_json(text: &str) -> Result<Self> {
        let config: TranslatorConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, resolving relative paths against its directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| TranslateError::io(path, e))?;
        let mut config = Self::from_json(&text)?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Prefix every relative path with `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };

        for mapping in &mut self.files_to_translate {
            resolve(&mut mapping.input);
            resolve(&mut mapping.output);
        }
        for path in &mut self.files_for_template_search {
            resolve(path);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.files_to_translate.is_empty() {
            return Err(TranslateError::Config(
                "files_to_translate must list at least one file".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(TranslateError::Config(
                "max_iterations must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for patch in &self.patches {
            if !seen.insert(patch.name) {
                return Err(TranslateError::Config(format!(
                    "patch {:?} is listed more than once",
                    patch.name
                )));
            }
        }
        Ok(())
    }

    /// Every file the collector scans: the search list, then the inputs
    pub fn corpus(&self) -> Vec<PathBuf> {
        let files: IndexSet<PathBuf> = self
            .files_for_template_search
            .iter()
            .cloned()
            .chain(self.files_to_translate.iter().map(|mapping| mapping.input.clone()))
            .collect();
        files.into_iter().collect()
    }

    /// Configured patches, or the default set when none are listed
    pub fn patch_set(&self) -> Vec<PatchConfig> {
        if !self.patches.is_empty() {
            return self.patches.clone();
        }
        PatchKind::ALL
            .iter()
            .map(|&name| PatchConfig {
                name,
                priority: None,
            })
            .collect()
    }

    /// Build the patch set around a collector snapshot
    pub fn build_patches(&self, instances: &Arc<TemplateInstances>) -> Vec<Box<dyn Patch>> {
        self.patch_set()
            .iter()
            .map(|patch| patch.name.build(patch.priority(), instances))
            .collect()
    }
}
