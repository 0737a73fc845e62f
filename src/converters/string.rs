use std::any::{Any, TypeId};
use std::io::{Cursor, Read};

use super::{DEFAULT_CHARSET, decode_text, encode_text};
use crate::converter::{ConversionResult, EntityReader, EntityWriter, Priority};

const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Text converter for `String` and `&'static str` honoring the entity charset.
#[derive(Clone, Copy, Debug, Default)]
pub struct StringConverter;

impl EntityWriter for StringConverter {
    fn supports(&self, type_id: TypeId, _: Option<&str>, _: Option<&str>) -> bool {
        type_id == TypeId::of::<String>() || type_id == TypeId::of::<&'static str>()
    }

    fn write(
        &self,
        value: &dyn Any,
        _: Option<&str>,
        charset: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Read + Send + Sync>>> {
        let text = if let Some(text) = value.downcast_ref::<String>() {
            text.as_str()
        } else if let Some(text) = value.downcast_ref::<&'static str>() {
            *text
        } else {
            return Ok(None);
        };
        let encoded = encode_text(text, charset)?;
        Ok(Some(Box::new(Cursor::new(encoded))))
    }

    fn content_type(&self) -> Option<&str> {
        Some(DEFAULT_CONTENT_TYPE)
    }

    fn charset(&self) -> Option<&str> {
        Some(DEFAULT_CHARSET)
    }

    fn priority(&self) -> Priority {
        Priority::BuiltinLow
    }
}

impl EntityReader for StringConverter {
    fn supports(&self, type_id: TypeId, _: Option<&str>, _: Option<&str>) -> bool {
        type_id == TypeId::of::<String>()
    }

    fn read(
        &self,
        _: TypeId,
        reader: &mut dyn Read,
        _: Option<&str>,
        charset: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Any + Send>>> {
        let mut collected = Vec::new();
        reader.read_to_end(&mut collected)?;
        Ok(Some(Box::new(decode_text(collected, charset)?)))
    }

    fn priority(&self) -> Priority {
        Priority::BuiltinLow
    }
}
