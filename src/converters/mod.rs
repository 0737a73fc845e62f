//! Converters shipped with the crate.
//!
//! [`EntityConverterManager::with_builtins`] registers the string, byte and form
//! converters. [`JsonConverter`] is opt-in per target type.

use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

use crate::converter::{ConversionError, ConversionResult, EntityConverterManager};

mod binary;
mod form;
mod json;
mod string;

pub use self::binary::BytesConverter;
pub use self::form::{FormData, FormDataWriter};
pub use self::json::JsonConverter;
pub use self::string::StringConverter;

pub(crate) const DEFAULT_CHARSET: &str = "UTF-8";

pub(crate) fn register_builtins(manager: &mut EntityConverterManager) {
    manager.add_converter(StringConverter);
    manager.add_converter(BytesConverter);
    manager.add_writer(Arc::new(FormDataWriter));
}

/// Resolves a charset label, `None` meaning UTF-8.
fn lookup_encoding(charset: Option<&str>) -> Option<&'static Encoding> {
    Encoding::for_label(charset.unwrap_or(DEFAULT_CHARSET).trim().as_bytes())
}

/// Encodes text in the named charset.
///
/// Unknown labels and unmappable characters are soft failures so the next writer
/// gets a chance.
pub(crate) fn encode_text(text: &str, charset: Option<&str>) -> ConversionResult<Vec<u8>> {
    let label = charset.unwrap_or(DEFAULT_CHARSET);
    let encoding = lookup_encoding(charset)
        .ok_or_else(|| ConversionError::failed(format!("unsupported charset {label}")))?;

    // WHATWG encoders never produce UTF-16; they fall back to UTF-8 output
    if encoding == UTF_16LE {
        return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
    }
    if encoding == UTF_16BE {
        return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
    }

    let (encoded, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(ConversionError::failed(format!(
            "text is not representable in {label}"
        )));
    }
    Ok(encoded.into_owned())
}

/// Decodes bytes in the named charset, falling back to UTF-8 for unknown labels.
/// Malformed sequences become U+FFFD.
pub(crate) fn decode_text(bytes: Vec<u8>, charset: Option<&str>) -> ConversionResult<String> {
    let encoding = lookup_encoding(charset).unwrap_or(UTF_8);
    if encoding == UTF_8 {
        return Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(error) => String::from_utf8_lossy(error.as_bytes()).into_owned(),
        });
    }
    let (decoded, _) = encoding.decode_without_bom_handling(&bytes);
    Ok(decoded.into_owned())
}
