// process:* opt-in group

use std::process::Command;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

use super::{string_arg, FunctionLibrary, PROCESS_NAMESPACE};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register(PROCESS_NAMESPACE, "run", 1, None, fn_run);
    library.register(PROCESS_NAMESPACE, "env", 1, Some(1), fn_env);
}

/// Run a command with the remaining arguments as its argv; the standard
/// output is the result.
fn fn_run(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let program = string_arg(evaluator, args, 0)?;
    let mut command = Command::new(&program);
    for index in 1..args.len() {
        command.arg(string_arg(evaluator, args, index)?);
    }
    let output = command.output()?;
    if !output.status.success() {
        return Err(Error::Io(format!(
            "{} exited with {}",
            program, output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(Sequence::singleton(stdout))
}

fn fn_env(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let name = string_arg(evaluator, args, 0)?;
    match std::env::var(&name) {
        Ok(value) => Ok(Sequence::singleton(value)),
        Err(_) => Ok(Sequence::new()),
    }
}
