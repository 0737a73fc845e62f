use std::any::{Any, TypeId};
use std::io::{Cursor, Read};
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::converter::{ConversionError, ConversionResult, EntityReader, EntityWriter, Priority};

const JSON_CONTENT_TYPE: &str = "application/json";

fn is_json_content_type(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    media_type == JSON_CONTENT_TYPE || media_type.ends_with("+json")
}

/// Reads and writes `T` as JSON through serde.
///
/// One instance serves one target type:
///
/// ```
/// use reqkit::EntityConverterManager;
/// use reqkit::converters::JsonConverter;
///
/// let mut converters = EntityConverterManager::with_builtins();
/// converters.add_converter(JsonConverter::<serde_json::Value>::new());
/// ```
pub struct JsonConverter<T> {
    priority: Priority,
    marker: PhantomData<fn() -> T>,
}

impl<T> JsonConverter<T> {
    pub fn new() -> Self {
        Self {
            priority: Priority::UserDefault,
            marker: PhantomData,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

impl<T> Default for JsonConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonConverter<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("JsonConverter")
            .field("target", &std::any::type_name::<T>())
            .field("priority", &self.priority)
            .finish()
    }
}

impl<T> EntityWriter for JsonConverter<T>
where
    T: Serialize + 'static,
{
    fn supports(&self, type_id: TypeId, content_type: Option<&str>, _: Option<&str>) -> bool {
        type_id == TypeId::of::<T>() && is_json_content_type(content_type)
    }

    fn write(
        &self,
        value: &dyn Any,
        _: Option<&str>,
        _: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Read + Send + Sync>>> {
        let Some(value) = value.downcast_ref::<T>() else {
            return Ok(None);
        };
        let encoded = serde_json::to_vec(value).map_err(ConversionError::failed)?;
        Ok(Some(Box::new(Cursor::new(encoded))))
    }

    fn content_type(&self) -> Option<&str> {
        Some(JSON_CONTENT_TYPE)
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}

impl<T> EntityReader for JsonConverter<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn supports(&self, type_id: TypeId, content_type: Option<&str>, _: Option<&str>) -> bool {
        type_id == TypeId::of::<T>() && is_json_content_type(content_type)
    }

    fn read(
        &self,
        _: TypeId,
        reader: &mut dyn Read,
        _: Option<&str>,
        _: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Any + Send>>> {
        let mut collected = Vec::new();
        reader.read_to_end(&mut collected)?;
        let value: T = serde_json::from_slice(&collected).map_err(ConversionError::failed)?;
        Ok(Some(Box::new(value)))
    }

    fn priority(&self) -> Priority {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::is_json_content_type;

    #[test]
    fn json_media_types_are_recognized() {
        assert!(is_json_content_type(None));
        assert!(is_json_content_type(Some("application/json; charset=UTF-8")));
        assert!(is_json_content_type(Some("application/problem+json")));
        assert!(!is_json_content_type(Some("text/plain")));
    }
}
