//! # Describe Subcommand

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Args;

use intentforge_policy::ExplanationGenerator;

use crate::{load_policies, EXIT_OK};

/// Arguments for `intentforge describe`.
#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Policy file (YAML or JSON).
    #[arg(long, value_name = "FILE")]
    pub policies: PathBuf,
}

/// Execute the describe subcommand. Descriptions are separated by a blank line.
pub fn run_describe(args: &DescribeArgs) -> Result<u8> {
    let policies = load_policies(&args.policies, Utc::now())?;
    let generator = ExplanationGenerator::new();
    let text: Vec<String> = policies.iter().map(|p| generator.describe_policy(p)).collect();
    println!("{}", text.join("\n\n"));
    Ok(EXIT_OK)
}
