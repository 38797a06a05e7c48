use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use cmirror_core::{init_tracing, FileTranslator, TranslationSummary, TranslatorConfig};
use tracing::{error, info};

fn cli() -> Command {
    Command::new("cmirror")
        .version(cmirror_core::VERSION)
        .about("Regenerates a C mirror of a C++ source corpus")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("JSON configuration listing the files to translate")
                .value_parser(value_parser!(PathBuf))
                .required(true),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Translate without writing any output")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("backup")
                .long("backup")
                .help("Copy existing outputs to <output>.backup before overwriting")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("debug"));

    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        error!("No configuration given");
        std::process::exit(2);
    };

    match run(
        config_path.clone(),
        matches.get_flag("dry-run"),
        matches.get_flag("backup"),
    ) {
        Ok(summary) => report(&summary),
        Err(e) => {
            error!("{e:#}");
            std::process::exit(1);
        }
    }
}

fn run(config_path: PathBuf, dry_run: bool, backup: bool) -> Result<TranslationSummary> {
    let config = TranslatorConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration {}", config_path.display()))?;

    info!(
        config = %config_path.display(),
        files = config.files_to_translate.len(),
        dry_run,
        "Starting translation"
    );

    FileTranslator::new(config)
        .dry_run(dry_run)
        .backup_originals(backup)
        .run()
        .context("Translation failed")
}

fn report(summary: &TranslationSummary) {
    info!(
        processed = summary.files_processed,
        changed = summary.files_changed,
        templates = summary.template_functions,
        instances = summary.template_instances,
        "Translation complete"
    );

    for (name, stats) in &summary.patch_stats {
        info!(
            patch = %name,
            matches = stats.matches,
            applied = stats.applied,
            no_ops = stats.no_ops,
            conflicts_lost = stats.conflicts_lost,
            time_ms = stats.total_time_ms,
            "Patch statistics"
        );
    }
}
