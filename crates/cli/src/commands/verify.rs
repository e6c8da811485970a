//! Module for the `verify` subcommand, which runs an original module and its
//! obfuscated form through the reference interpreter and compares them.

use crate::commands::CommandError;
use async_trait::async_trait;
use clap::Args;
use murk_core::read_source;
use murk_verification::{parse_argument, Value, Verifier, DEFAULT_STEP_LIMIT};
use std::error::Error;
use std::fs;

/// Arguments for the `verify` subcommand.
#[derive(Args)]
pub struct VerifyArgs {
    /// Path of the original module.
    pub original: String,
    /// Path of the obfuscated module.
    pub obfuscated: String,
    /// Routine to call in both modules.
    #[arg(long)]
    pub entry: String,
    /// Literal argument passed to the entry routine; repeat for more.
    #[arg(long = "arg", value_name = "LITERAL")]
    pub args: Vec<String>,
    /// Statements either run may execute before it is abandoned.
    #[arg(long, default_value_t = DEFAULT_STEP_LIMIT)]
    pub step_limit: usize,
    /// Path to emit the verification report as JSON (optional).
    #[arg(long)]
    pub emit: Option<String>,
}

#[async_trait]
impl super::Command for VerifyArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let original = read_source(&self.original)?;
        let obfuscated = read_source(&self.obfuscated)?;
        let args = self
            .args
            .iter()
            .map(|text| parse_argument(text).map_err(|_| CommandError::InvalidArgument(text.clone())))
            .collect::<Result<Vec<Value>, _>>()?;

        let report = Verifier::with_step_limit(self.step_limit).verify_equivalence(
            &original,
            &obfuscated,
            &self.entry,
            &args,
        )?;

        if let Some(path) = self.emit.as_ref() {
            let json = serde_json::to_string_pretty(&report).map_err(CommandError::from)?;
            fs::write(path, json).map_err(CommandError::from)?;
            tracing::info!("wrote verification report to {}", path);
        }

        for line in &report.original.output {
            println!("{line}");
        }
        println!("{:?}", report.original.outcome);

        if !report.equivalent {
            tracing::warn!(
                "obfuscated output: {:?} {:?}",
                report.obfuscated.output,
                report.obfuscated.outcome
            );
            return Err(CommandError::Mismatch(report.entry).into());
        }
        Ok(())
    }
}
