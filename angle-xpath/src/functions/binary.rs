// binary:* opt-in group

use std::rc::Rc;

use base64::Engine;

use crate::atomic::Atomic;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

use super::{string_arg, FunctionLibrary, BINARY_NAMESPACE};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register(BINARY_NAMESPACE, "to-base64", 1, Some(1), fn_to_base64);
    library.register(BINARY_NAMESPACE, "from-base64", 1, Some(1), fn_from_base64);
    library.register(BINARY_NAMESPACE, "to-hex", 1, Some(1), fn_to_hex);
    library.register(BINARY_NAMESPACE, "from-hex", 1, Some(1), fn_from_hex);
    library.register(BINARY_NAMESPACE, "decode-string", 1, Some(1), fn_decode_string);
}

/// Bytes of the argument: binary atomics pass through, everything else
/// contributes its UTF-8 string value.
fn bytes_arg(evaluator: &Evaluator, args: &[Sequence], index: usize) -> Result<Vec<u8>> {
    match args[index].atomized_one(evaluator.forest)? {
        Atomic::Binary(bytes) => Ok(bytes.to_vec()),
        other => Ok(other.string_value().into_bytes()),
    }
}

fn fn_to_base64(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let bytes = bytes_arg(evaluator, args, 0)?;
    Ok(Sequence::singleton(
        base64::engine::general_purpose::STANDARD.encode(bytes),
    ))
}

fn fn_from_base64(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let text = string_arg(evaluator, args, 0)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|err| Error::type_error(format!("invalid base64: {}", err)))?;
    Ok(Sequence::singleton(Atomic::Binary(Rc::from(
        bytes.as_slice(),
    ))))
}

fn fn_to_hex(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let bytes = bytes_arg(evaluator, args, 0)?;
    Ok(Sequence::singleton(hex::encode(bytes)))
}

fn fn_from_hex(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let text = string_arg(evaluator, args, 0)?;
    let bytes = hex::decode(text.trim())
        .map_err(|err| Error::type_error(format!("invalid hex: {}", err)))?;
    Ok(Sequence::singleton(Atomic::Binary(Rc::from(
        bytes.as_slice(),
    ))))
}

fn fn_decode_string(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let bytes = bytes_arg(evaluator, args, 0)?;
    let text = String::from_utf8(bytes)
        .map_err(|err| Error::type_error(format!("invalid utf-8: {}", err)))?;
    Ok(Sequence::singleton(text))
}
