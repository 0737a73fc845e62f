use std::any::{Any, TypeId};
use std::io::{Cursor, Read};

use super::{DEFAULT_CHARSET, encode_text};
use crate::converter::{ConversionResult, EntityWriter, Priority};
use crate::multi_map::MultiValuedMap;

const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Fields of a URL-encoded form body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormData {
    fields: MultiValuedMap,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, name: impl AsRef<str>, value: impl Into<String>) -> &mut Self {
        self.fields.add(name, value);
        self
    }

    pub fn add_field_values<I, V>(&mut self, name: impl AsRef<str>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.fields.add_all(name, values);
        self
    }

    pub fn add_fields(&mut self, fields: &MultiValuedMap) -> &mut Self {
        self.fields.merge(fields);
        self
    }

    pub fn fields(&self) -> &MultiValuedMap {
        &self.fields
    }

    /// `application/x-www-form-urlencoded` rendering of the fields.
    pub fn encode(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, values) in &self.fields {
            for value in values {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }
}

/// Writes [`FormData`] as a URL-encoded body.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormDataWriter;

impl EntityWriter for FormDataWriter {
    fn supports(&self, type_id: TypeId, _: Option<&str>, _: Option<&str>) -> bool {
        type_id == TypeId::of::<FormData>()
    }

    fn write(
        &self,
        value: &dyn Any,
        _: Option<&str>,
        charset: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Read + Send + Sync>>> {
        let Some(form) = value.downcast_ref::<FormData>() else {
            return Ok(None);
        };
        let encoded = encode_text(&form.encode(), charset)?;
        Ok(Some(Box::new(Cursor::new(encoded))))
    }

    fn content_type(&self) -> Option<&str> {
        Some(DEFAULT_CONTENT_TYPE)
    }

    fn charset(&self) -> Option<&str> {
        Some(DEFAULT_CHARSET)
    }

    fn priority(&self) -> Priority {
        Priority::BuiltinDefault
    }
}

#[cfg(test)]
mod tests {
    use super::FormData;

    #[test]
    fn encode_escapes_names_and_values() {
        let mut form = FormData::new();
        form.add_field("name", "Jane Doe")
            .add_field_values("tag", ["a&b", "c"]);
        assert_eq!(form.encode(), "name=Jane+Doe&tag=a%26b&tag=c");
    }
}
