//! Module for the `obfuscate` subcommand, which rewrites a BSL module with the
//! selected techniques.
//!
//! The toggles map one to one onto [`ObfuscationConfig`]; the module is run
//! through the pipeline from `murk-transform` and printed to stdout or a file.

use crate::commands::CommandError;
use async_trait::async_trait;
use clap::Args;
use murk_core::{read_source, PrintConfig, Seed};
use murk_transform::{obfuscate_source, ObfuscationConfig};
use std::error::Error;
use std::fs;

/// Technique toggles shared by every command that obfuscates.
#[derive(Args, Debug, Clone, Default)]
pub struct TechniqueArgs {
    /// Hide values and right operands behind nested `?()` chains.
    #[arg(long)]
    pub conditional_chains: bool,
    /// Rewrite `Пока` and `Для` loops into labels and jumps.
    #[arg(long)]
    pub loops_to_jumps: bool,
    /// Replace calls by `Выполнить`/`Вычислить` of their encrypted text.
    #[arg(long)]
    pub dynamic_eval: bool,
    /// Replace string literals by calls to a decoder routine.
    #[arg(long)]
    pub hide_strings: bool,
    /// Pad `Если` conditions with true conjuncts and false `ИначеЕсли` arms.
    #[arg(long)]
    pub randomize_conditions: bool,
    /// Sprinkle inert statements, branches and loops.
    #[arg(long)]
    pub inject_garbage: bool,
    /// Enable every boolean technique above.
    #[arg(long)]
    pub all: bool,
    /// Number of trampoline functions in front of returned or assigned literals.
    #[arg(long, default_value_t = 0)]
    pub call_stack_depth: usize,
    /// Seed for deterministic obfuscation (64 hex chars, optional 0x prefix).
    #[arg(long)]
    pub seed: Option<String>,
}

impl TechniqueArgs {
    /// Builds the pipeline configuration, validating the seed.
    pub fn to_config(&self, print: PrintConfig) -> Result<ObfuscationConfig, CommandError> {
        let mut config = if self.all {
            ObfuscationConfig::all(self.call_stack_depth)
        } else {
            ObfuscationConfig {
                conditional_chains: self.conditional_chains,
                loops_to_jumps: self.loops_to_jumps,
                dynamic_eval: self.dynamic_eval,
                hide_strings: self.hide_strings,
                randomize_conditions: self.randomize_conditions,
                inject_garbage: self.inject_garbage,
                call_stack_depth: self.call_stack_depth,
                ..ObfuscationConfig::default()
            }
        };
        if let Some(seed_hex) = &self.seed {
            let seed = Seed::from_hex(seed_hex).map_err(CommandError::InvalidSeed)?;
            config = config.with_seed(seed);
        }
        config.print = print;
        Ok(config)
    }
}

/// Arguments for the `obfuscate` subcommand.
#[derive(Args)]
pub struct ObfuscateArgs {
    /// Path of the `.bsl` module to obfuscate.
    pub input: String,
    #[command(flatten)]
    pub techniques: TechniqueArgs,
    /// Print routines over several indented lines instead of one line each.
    #[arg(long)]
    pub pretty: bool,
    /// Indentation width in spaces.
    #[arg(long, default_value_t = PrintConfig::compact().margin)]
    pub margin: usize,
    /// Write the obfuscated module here instead of stdout.
    #[arg(long, short)]
    pub output: Option<String>,
    /// Path to emit the run statistics and metrics as JSON (optional).
    #[arg(long)]
    pub emit: Option<String>,
}

/// Executes the `obfuscate` subcommand using the obfuscation pipeline.
#[async_trait]
impl super::Command for ObfuscateArgs {
    async fn execute(self) -> Result<(), Box<dyn Error>> {
        let ObfuscateArgs {
            input,
            techniques,
            pretty,
            margin,
            output,
            emit,
        } = self;

        // Step 1: Read input
        let source = read_source(&input)?;

        // Step 2: Configure obfuscation
        let config = techniques.to_config(PrintConfig {
            one_line: !pretty,
            margin,
        })?;
        if !config.any_enabled() {
            tracing::warn!("no technique selected, the module is only reprinted");
        }

        // Step 3: Run obfuscation pipeline
        let result = obfuscate_source(&source, config).await?;
        tracing::info!("seed {}", result.seed);

        // Step 4: Write report if requested
        if let Some(path) = emit.as_ref() {
            let report = serde_json::to_string_pretty(&result).map_err(CommandError::from)?;
            fs::write(path, report).map_err(CommandError::from)?;
            tracing::info!("wrote obfuscation report to {}", path);
        }

        // Step 5: Output the module
        match output {
            Some(path) => {
                fs::write(&path, &result.source).map_err(CommandError::from)?;
                tracing::info!("wrote obfuscated module to {}", path);
            }
            None => println!("{}", result.source),
        }
        Ok(())
    }
}
