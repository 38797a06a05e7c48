/*!
# FileTranslator - Configured Translation Runs

Runs the template collector over the configured corpus, then rewrites every
configured file with the resulting patch set and writes the translations.
Any error aborts the run.
*/

use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::collector::{TemplateCollector, TemplateInstances};
use crate::config::TranslatorConfig;
use crate::engine::TranslationEngine;
use crate::patch::PatchStats;
use crate::{Result, TranslateError};

/// Configured, file-based translation run
pub struct FileTranslator {
    config: TranslatorConfig,
    dry_run: bool,
    backup_originals: bool,
}

impl FileTranslator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            config,
            dry_run: false,
            backup_originals: false,
        }
    }

    /// Enable dry-run mode (translations are computed but not written)
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Whether to copy an existing output file to `<output>.backup` first
    pub fn backup_originals(mut self, backup: bool) -> Self {
        self.backup_originals = backup;
        self
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Collect template instances over the configured corpus
    pub fn collect(&self) -> Result<TemplateInstances> {
        let corpus = self.config.corpus();
        info!(files = corpus.len(), "Collecting template instances");

        TemplateCollector::new()?
            .with_arg_deduction(self.config.templates_with_arg_deduction.iter().cloned())
            .collect_files(&corpus)
    }

    /// Collect, then translate and write every configured file
    pub fn run(&self) -> Result<TranslationSummary> {
        let instances = Arc::new(self.collect()?);
        let mut engine = TranslationEngine::with_patches(self.config.build_patches(&instances))?
            .max_iterations(self.config.max_iterations);
        debug!(patches = ?engine.patch_names(), "Patch set ready");

        let mut summary = TranslationSummary {
            template_functions: instances.template_names().count(),
            template_instances: instances.instance_count(),
            ..Default::default()
        };

        for mapping in &self.config.files_to_translate {
            let source = fs::read(&mapping.input).map_err(|e| TranslateError::io(&mapping.input, e))?;
            let translated = engine.translate(source.clone())?;
            let changed = translated != source;

            info!(
                input = %mapping.input.display(),
                output = %mapping.output.display(),
                changed,
                "Translated"
            );

            summary.files_processed += 1;
            if changed {
                summary.files_changed += 1;
            }

            if !self.dry_run {
                self.write_output(&mapping.output, &translated)?;
            }
        }

        summary.patch_stats = engine.stats().clone();
        Ok(summary)
    }

    fn write_output(&self, output: &Path, bytes: &[u8]) -> Result<()> {
        if self.backup_originals && output.exists() {
            let mut backup = output.as_os_str().to_owned();
            backup.push(".backup");
            fs::copy(output, &backup).map_err(|e| TranslateError::io(output, e))?;
        }

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| TranslateError::io(parent, e))?;
        }
        fs::write(output, bytes).map_err(|e| TranslateError::io(output, e))
    }
}

/// Summary of a translation run
#[derive(Debug, Default)]
pub struct TranslationSummary {
    pub files_processed: u64,
    pub files_changed: u64,
    pub template_functions: usize,
    pub template_instances: usize,
    pub patch_stats: IndexMap<String, PatchStats>,
}

impl TranslationSummary {
    pub fn change_rate(&self) -> f64 {
        if self.files_processed == 0 {
            0.0
        } else {
            (self.files_changed as f64) / (self.files_processed as f64)
        }
    }
}
