//! kazel CLI - BUILD file generation for Go trees

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use kazel::build_file::ParseError;
use kazel::ops::{update, Failure, UpdateOptions};
use kazel::util::diff::unified_diff;
use kazel::util::fs::relative_path;
use kazel::util::Config;

mod cli;

use cli::Cli;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether the run succeeded.
fn run() -> Result<bool> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("kazel=debug")
    } else {
        EnvFilter::new("kazel=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let config = Config::load(&cli.config_path())?;
    let opts = UpdateOptions {
        root: cli.root.clone(),
        config,
        dry_run: cli.dry_run,
        package: cli.package.clone(),
    };
    let report = update(&opts)?;

    for reconciled in report.changed() {
        let rel = relative_path(&cli.root, &reconciled.path);
        if cli.dry_run {
            eprintln!("Would update {}", rel.display());
        } else {
            eprintln!("       Wrote {}", rel.display());
        }
        if cli.print_diff {
            let original = reconciled.original.as_deref().unwrap_or("");
            let label = rel.to_string_lossy();
            print!("{}", unified_diff(&label, original, &reconciled.formatted)?);
        }
    }

    let would_change = cli.dry_run && report.has_changes();
    let failed = report.failures.len();
    for failure in report.failures {
        report_failure(failure);
    }
    if failed > 0 {
        eprintln!("error: {} directories failed", failed);
        return Ok(false);
    }

    Ok(!would_change)
}

fn report_failure(failure: Failure) {
    let Failure { dir, error } = failure;
    match error.downcast::<ParseError>() {
        Ok(parse_error) => eprintln!("{:?}", miette::Report::new(parse_error)),
        Err(error) => eprintln!("error: {}: {:#}", dir.display(), error),
    }
}
