use clap::Parser;
use fgs_evidence::cli::{Cli, Command};
use fgs_evidence::manifest::verify_manifest;
use fgs_evidence::orchestrator::EvidencePipeline;
use fgs_evidence::validate::validate_pack;
use fgs_evidence::{PackError, PackResult};

/// Exit status when `verify` or `validate` find problems.
const EXIT_PROBLEMS: i32 = 2;

fn main() {
    let cli = Cli::parse();
    fgs_evidence::logging::init(cli.verbose);

    match run(cli) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(error) => {
            tracing::debug!(error_code = error.error_code(), "fatal");
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> PackResult<i32> {
    match cli.command {
        Command::Run(args) => {
            let config = args.to_config()?;
            let summary = EvidencePipeline::new(config).run()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("run {}", summary.run_id);
                println!("results:  {}", summary.results_path.display());
                println!("report:   {}", summary.report_path.display());
                println!("manifest: {}", summary.manifest_path.display());
                if let Some(path) = &summary.comparison_path {
                    println!("compare:  {}", path.display());
                }
                println!(
                    "stages: {} tool invocations, {} cache hits",
                    summary.invoked_count(),
                    summary.cached_count()
                );
            }
            Ok(0)
        }
        Command::Verify(args) => {
            let report = verify_manifest(&args.manifest)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.is_ok() {
                println!("OK: {} file(s) verified", report.checked);
            } else {
                for problem in &report.problems {
                    println!("{problem}");
                }
                println!("FAILED: {} problem(s) found", report.problems.len());
            }
            Ok(if report.is_ok() { 0 } else { EXIT_PROBLEMS })
        }
        Command::Validate(args) => {
            if !args.artifacts.is_dir() {
                return Err(PackError::InvalidRequest(format!(
                    "artifacts directory `{}` does not exist",
                    args.artifacts.display()
                )));
            }
            let report = validate_pack(&args.artifacts);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.is_ok() {
                println!("OK: artifacts are present and minimally valid");
            } else {
                for problem in &report.problems {
                    println!("{problem}");
                }
            }
            Ok(if report.is_ok() { 0 } else { EXIT_PROBLEMS })
        }
    }
}
