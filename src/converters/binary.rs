use std::any::{Any, TypeId};
use std::io::{Cursor, Read};

use bytes::Bytes;

use crate::converter::{ConversionResult, EntityReader, EntityWriter, Priority};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Raw byte passthrough for `Vec<u8>` and [`Bytes`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesConverter;

fn is_byte_type(type_id: TypeId) -> bool {
    type_id == TypeId::of::<Vec<u8>>() || type_id == TypeId::of::<Bytes>()
}

impl EntityWriter for BytesConverter {
    fn supports(&self, type_id: TypeId, _: Option<&str>, _: Option<&str>) -> bool {
        is_byte_type(type_id)
    }

    fn write(
        &self,
        value: &dyn Any,
        _: Option<&str>,
        _: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Read + Send + Sync>>> {
        let bytes = if let Some(bytes) = value.downcast_ref::<Bytes>() {
            bytes.clone()
        } else if let Some(bytes) = value.downcast_ref::<Vec<u8>>() {
            Bytes::copy_from_slice(bytes)
        } else {
            return Ok(None);
        };
        Ok(Some(Box::new(Cursor::new(bytes))))
    }

    fn content_type(&self) -> Option<&str> {
        Some(DEFAULT_CONTENT_TYPE)
    }

    fn priority(&self) -> Priority {
        Priority::BuiltinDefault
    }
}

impl EntityReader for BytesConverter {
    fn supports(&self, type_id: TypeId, _: Option<&str>, _: Option<&str>) -> bool {
        is_byte_type(type_id)
    }

    fn read(
        &self,
        type_id: TypeId,
        reader: &mut dyn Read,
        _: Option<&str>,
        _: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Any + Send>>> {
        let mut collected = Vec::new();
        reader.read_to_end(&mut collected)?;
        if type_id == TypeId::of::<Bytes>() {
            return Ok(Some(Box::new(Bytes::from(collected))));
        }
        Ok(Some(Box::new(collected)))
    }

    fn priority(&self) -> Priority {
        Priority::BuiltinDefault
    }
}
