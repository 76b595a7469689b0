// date and time functions

use chrono::{Local, Utc};

use crate::context::Context;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;
use crate::types::XdmType;

use super::FunctionLibrary;

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register_fn("current-date", 0, Some(0), fn_current_date);
    library.register_fn("current-dateTime", 0, Some(0), fn_current_datetime);
    library.register_fn("date", 1, Some(1), fn_date);
}

fn fn_current_date(
    _evaluator: &mut Evaluator,
    _context: &Context,
    _args: &[Sequence],
) -> Result<Sequence> {
    Ok(Sequence::singleton(crate::Atomic::Date(
        Local::now().date_naive(),
    )))
}

fn fn_current_datetime(
    _evaluator: &mut Evaluator,
    _context: &Context,
    _args: &[Sequence],
) -> Result<Sequence> {
    Ok(Sequence::singleton(crate::Atomic::DateTime(
        Utc::now().fixed_offset(),
    )))
}

fn fn_date(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    match args[0].atomized_option(evaluator.forest)? {
        None => Ok(Sequence::new()),
        Some(atomic) => Ok(Sequence::singleton(atomic.cast_to(XdmType::Date)?)),
    }
}
