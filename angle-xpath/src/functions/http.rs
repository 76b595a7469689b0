// http:* opt-in group

use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

use super::{string_arg, FunctionLibrary, HTTP_NAMESPACE};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register(HTTP_NAMESPACE, "get", 1, Some(1), fn_get);
    library.register(HTTP_NAMESPACE, "post", 2, Some(2), fn_post);
}

fn fn_get(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let uri = string_arg(evaluator, args, 0)?;
    let body = ureq::get(&uri)
        .set("Accept", "text/xml")
        .call()
        .map_err(|err| Error::Io(err.to_string()))?
        .into_string()?;
    Ok(Sequence::singleton(body))
}

fn fn_post(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let uri = string_arg(evaluator, args, 0)?;
    let payload = string_arg(evaluator, args, 1)?;
    let body = ureq::post(&uri)
        .set("Accept", "text/xml")
        .send_string(&payload)
        .map_err(|err| Error::Io(err.to_string()))?
        .into_string()?;
    Ok(Sequence::singleton(body))
}
