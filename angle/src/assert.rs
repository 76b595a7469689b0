use std::path::PathBuf;

use angle_schematron::{Level, RunOptions, Schema};
use angle_xml::Forest;
use clap::{Parser, ValueEnum};

use crate::common;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LevelArg {
    Info,
    Warning,
    Error,
}

impl From<LevelArg> for Level {
    fn from(level: LevelArg) -> Level {
        match level {
            LevelArg::Info => Level::Info,
            LevelArg::Warning => Level::Warning,
            LevelArg::Error => Level::Error,
        }
    }
}

#[derive(Debug, Parser)]
pub(crate) struct Assert {
    /// Schematron schema file
    schema: PathBuf,
    /// input xml file or url (default stdin)
    infile: Option<PathBuf>,
    /// Run only this phase
    #[arg(short = 'p', long)]
    phase: Option<String>,
    /// Run only this pattern
    #[arg(short = 'g', long)]
    group: Option<String>,
    /// Count failures at or above this severity for the exit status
    #[arg(short = 'l', long, value_enum)]
    level: Option<LevelArg>,
    /// Stop at the first failing assert
    #[arg(long = "fail-fast")]
    fail_fast: bool,
    /// Skip asserts whose context selected no nodes
    #[arg(long = "ignore-zero")]
    ignore_zero: bool,
    /// Print nothing; only the exit status reports the outcome
    #[arg(short = 'q', long)]
    quiet: bool,
}

impl Assert {
    pub(crate) fn run(&self) -> anyhow::Result<u8> {
        let schema_text = common::read_input(Some(&self.schema))?;
        let input_text = common::read_input(self.infile.as_ref())?;

        let mut forest = Forest::new();
        let schema = Schema::load(&mut forest, &schema_text)?;
        let doc = forest.parse(&input_text)?;

        let options = RunOptions {
            phase: self.phase.clone(),
            group: self.group.clone(),
            fail_fast: self.fail_fast,
            ..RunOptions::default()
        };
        let report = schema.run(&forest, doc, &options)?;

        if !self.quiet {
            let mut lines = Vec::new();
            for result in &report.results {
                if self.ignore_zero && result.total == 0 {
                    continue;
                }
                let status = if result.failed == 0 { "ok" } else { "FAIL" };
                lines.push(format!(
                    "{:4} {} ({}): {}/{} passed",
                    status,
                    result.id.as_deref().unwrap_or(&result.test),
                    result.context,
                    result.passed,
                    result.total,
                ));
                for offender in &result.offenders {
                    lines.push(format!("     at {}: {}", offender, result.message));
                }
            }
            common::write_output(None, &lines.join("\n"))?;
        }

        let failed = match self.level {
            Some(level) => report.failed_at_level(level.into()),
            None => report.failed(),
        };
        if failed > 0 {
            Ok(common::EXIT_UNSATISFIED)
        } else {
            Ok(0)
        }
    }
}
