// crypto:* opt-in group

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

use super::{string_arg, FunctionLibrary, CRYPTO_NAMESPACE};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register(CRYPTO_NAMESPACE, "hash", 2, Some(2), fn_hash);
    library.register(CRYPTO_NAMESPACE, "hmac", 3, Some(3), fn_hmac);
}

fn fn_hash(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let data = string_arg(evaluator, args, 0)?;
    let algorithm = string_arg(evaluator, args, 1)?;
    let digest = match algorithm.to_ascii_lowercase().as_str() {
        "sha-256" | "sha256" => hex::encode(Sha256::digest(data.as_bytes())),
        "sha-512" | "sha512" => hex::encode(Sha512::digest(data.as_bytes())),
        other => {
            return Err(Error::type_error(format!(
                "unknown hash algorithm {:?}",
                other
            )))
        }
    };
    Ok(Sequence::singleton(digest))
}

fn fn_hmac(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let data = string_arg(evaluator, args, 0)?;
    let key = string_arg(evaluator, args, 1)?;
    let algorithm = string_arg(evaluator, args, 2)?;
    let digest = match algorithm.to_ascii_lowercase().as_str() {
        "sha-256" | "sha256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
                .map_err(|err| Error::type_error(err.to_string()))?;
            mac.update(data.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
        "sha-512" | "sha512" => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key.as_bytes())
                .map_err(|err| Error::type_error(err.to_string()))?;
            mac.update(data.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
        other => {
            return Err(Error::type_error(format!(
                "unknown hmac algorithm {:?}",
                other
            )))
        }
    };
    Ok(Sequence::singleton(digest))
}
