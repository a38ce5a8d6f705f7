//! Manifest command implementation

use crate::cli::ManifestArgs;
use crate::error::add_path_context;
use crate::output::ManifestSummary;
use crate::output::OutputFormatter;
use crate::output::annotations::write_annotations;
use anyhow::Result;
use distrolint_core::IssueSink;
use distrolint_core::Manifest;
use distrolint_core::ManifestValidator;
use distrolint_core::PolicyConfig;
use std::io;
use std::path::Path;

pub fn execute(args: &ManifestArgs, formatter: &dyn OutputFormatter, json: bool) -> Result<bool> {
    let manifest = add_path_context(Manifest::from_file(&args.manifest), &args.manifest)?;
    let baseline = args
        .baseline
        .as_deref()
        .map(|path| add_path_context(Manifest::from_file(path), path))
        .transpose()?;

    // Archive paths in the manifest are relative to the manifest itself.
    let base_dir = args
        .manifest
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let config = PolicyConfig::default();
    let mut validator = ManifestValidator::new(&config, base_dir);
    if let Some(baseline) = &baseline {
        validator = validator.with_baseline(baseline);
    }

    let mut sink = IssueSink::new();
    let outcomes = validator.validate(&manifest, &mut sink);

    formatter.format_manifest_result(&ManifestSummary {
        manifest: &args.manifest,
        outcomes: &outcomes,
        sink: &sink,
    })?;

    if args.annotate {
        if json {
            formatter.format_warning("--annotate is ignored with --json");
        } else {
            write_annotations(&mut io::stdout().lock(), &args.manifest, &sink)?;
        }
    }

    Ok(!sink.has_errors())
}
