use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::{
    config::{FinalizeArgs, OutputConfig, PipelineConfig, RewriteArgs},
    error::CommandError,
    pipeline,
    report::RunReporter,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Harvest header sets from a resources directory, deduplicate them against the existing
    /// fixtures, re-detect every survivor and rewrite the sharded fixture pages
    Rewrite(RewriteArgs),

    /// Rewrite the fixture pages from the intermediates of an earlier run, without reading sources
    Finalize(FinalizeArgs),
}

impl Cli {
    pub fn run() -> Result<(), CommandError> {
        let command = Cli::parse();

        let reporter = match command.command {
            Commands::Rewrite(args) => {
                let config = PipelineConfig::from(args);
                config.validate()?;
                let normalizer = config.output.build_normalizer()?;
                let detector = config.build_detector()?;
                pipeline::run(&config, detector, normalizer)?
            }
            Commands::Finalize(args) => {
                let output = OutputConfig::from(args.output);
                let normalizer = output.build_normalizer()?;
                pipeline::finalize_only(&output, normalizer)?
            }
        };

        print_summary(&reporter);
        Ok(())
    }
}

fn print_summary(reporter: &RunReporter) {
    println!();
    for line in reporter.summary().lines() {
        if line.starts_with("errors") && reporter.errors > 0 {
            println!("{}", line.red().bold());
        } else {
            println!("{line}");
        }
    }
}
