//! Check command implementation

use crate::cli::CheckArgs;
use crate::error::add_path_context;
use crate::output::CheckSummary;
use crate::output::OutputFormatter;
use anyhow::Result;
use distrolint_core::IssueSink;
use distrolint_core::PolicyConfig;
use distrolint_core::formats::ArchiveSource;
use distrolint_core::report::IssueScope;
use distrolint_core::types::Architecture;
use distrolint_core::validate_archive;

pub fn execute(args: &CheckArgs, formatter: &dyn OutputFormatter) -> Result<bool> {
    let config = build_config(args);

    let source = add_path_context(ArchiveSource::open(&args.archive), &args.archive)?;
    let format = source.format();
    let sha256 = source.sha256_hex();

    let mut sink = IssueSink::new();
    add_path_context(
        validate_archive(source.into_reader(), &config, &IssueScope::archive(), &mut sink),
        &args.archive,
    )?;

    formatter.format_check_result(&CheckSummary {
        archive: &args.archive,
        format,
        sha256,
        sink: &sink,
    })?;

    Ok(!sink.has_errors())
}

fn build_config(args: &CheckArgs) -> PolicyConfig {
    let architecture = if args.arm64 {
        Architecture::Arm64
    } else {
        Architecture::X64
    };
    let config = PolicyConfig::default().with_architecture(architecture);
    match args.max_symlink_hops {
        Some(hops) => config.with_max_symlink_hops(usize::from(hops)),
        None => config,
    }
}
