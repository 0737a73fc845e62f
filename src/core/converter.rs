use std::any::{Any, TypeId};
use std::io::Read;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::entity::{Entity, EntityStream};
use crate::error::{BoxError, Error as ClientError};

/// Ordering tier of a converter. Higher tiers are consulted first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    BuiltinLow,
    BuiltinDefault,
    #[default]
    UserDefault,
    UserHigh,
}

/// Failure of a single converter.
///
/// `Io` aborts the conversion; `Failed` moves on to the next candidate.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("conversion failed: {0}")]
    Failed(BoxError),
}

impl ConversionError {
    pub fn failed(source: impl Into<BoxError>) -> Self {
        Self::Failed(source.into())
    }
}

pub type ConversionResult<T> = std::result::Result<T, ConversionError>;

/// Converts a value into a body stream.
pub trait EntityWriter: Send + Sync {
    fn supports(&self, type_id: TypeId, content_type: Option<&str>, charset: Option<&str>) -> bool;

    /// `Ok(None)` declines the value and lets the next writer try.
    fn write(
        &self,
        value: &dyn Any,
        content_type: Option<&str>,
        charset: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Read + Send + Sync>>>;

    fn content_type(&self) -> Option<&str> {
        None
    }

    fn charset(&self) -> Option<&str> {
        None
    }

    fn priority(&self) -> Priority {
        Priority::UserDefault
    }

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Converts a body stream into a value.
pub trait EntityReader: Send + Sync {
    fn supports(&self, type_id: TypeId, content_type: Option<&str>, charset: Option<&str>) -> bool;

    /// Produces a value of the type identified by `type_id`. `Ok(None)` declines the
    /// body and lets the next reader try.
    fn read(
        &self,
        type_id: TypeId,
        reader: &mut dyn Read,
        content_type: Option<&str>,
        charset: Option<&str>,
    ) -> ConversionResult<Option<Box<dyn Any + Send>>>;

    fn priority(&self) -> Priority {
        Priority::UserDefault
    }

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Ordered registry of entity readers and writers.
///
/// Registration happens while the manager is exclusively owned, typically through
/// [`crate::HttpClientBuilder`]. Once shared behind an [`Arc`] it is read-only.
#[derive(Clone, Default)]
pub struct EntityConverterManager {
    writers: Vec<Arc<dyn EntityWriter>>,
    readers: Vec<Arc<dyn EntityReader>>,
}

impl EntityConverterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager preloaded with the string, byte and form converters.
    pub fn with_builtins() -> Self {
        let mut manager = Self::new();
        crate::converters::register_builtins(&mut manager);
        manager
    }

    pub fn add_writer(&mut self, writer: Arc<dyn EntityWriter>) -> &mut Self {
        self.writers.push(writer);
        // stable: equal tiers keep registration order
        self.writers
            .sort_by(|left, right| right.priority().cmp(&left.priority()));
        self
    }

    pub fn add_reader(&mut self, reader: Arc<dyn EntityReader>) -> &mut Self {
        self.readers.push(reader);
        self.readers
            .sort_by(|left, right| right.priority().cmp(&left.priority()));
        self
    }

    /// Registers a converter that is both a reader and a writer.
    pub fn add_converter<C>(&mut self, converter: C) -> &mut Self
    where
        C: EntityReader + EntityWriter + 'static,
    {
        let converter = Arc::new(converter);
        self.add_writer(converter.clone());
        self.add_reader(converter)
    }

    pub fn writers(&self) -> &[Arc<dyn EntityWriter>] {
        &self.writers
    }

    pub fn readers(&self) -> &[Arc<dyn EntityReader>] {
        &self.readers
    }

    /// Converts `value` into an entity with the first writer that supports its type.
    ///
    /// The caller's content type and charset win over the writer's defaults.
    pub fn write<T: Any>(
        &self,
        value: &T,
        content_type: Option<&str>,
        charset: Option<&str>,
    ) -> crate::Result<Entity> {
        let type_id = TypeId::of::<T>();

        for writer in &self.writers {
            if !writer.supports(type_id, content_type, charset) {
                continue;
            }

            let stream: EntityStream = match writer.write(value, content_type, charset) {
                Ok(Some(stream)) => stream,
                Ok(None) => continue,
                Err(error) => {
                    trace!(
                        writer = writer.name(),
                        error = %error,
                        "entity writer failed, trying next candidate"
                    );
                    continue;
                }
            };

            let content_type = content_type.or_else(|| writer.content_type());
            let charset = charset.or_else(|| writer.charset());
            match Entity::from_stream(stream, content_type, charset) {
                Ok(entity) => return Ok(entity),
                Err(ClientError::Io { source }) => return Err(ClientError::Io { source }),
                Err(error) => {
                    trace!(
                        writer = writer.name(),
                        error = %error,
                        "entity writer produced no content, trying next candidate"
                    );
                }
            }
        }

        Err(ClientError::UnsupportedConversion {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Converts the entity into `T` with the first reader that supports it.
    ///
    /// I/O failures propagate; any other reader failure moves on to the next candidate.
    /// The entity is not closed here.
    pub fn read<T: Any>(&self, entity: &mut Entity) -> crate::Result<T> {
        let type_id = TypeId::of::<T>();
        let content_type = entity.content_type().map(ToOwned::to_owned);
        let charset = entity.charset().map(ToOwned::to_owned);

        for reader in &self.readers {
            if !reader.supports(type_id, content_type.as_deref(), charset.as_deref()) {
                continue;
            }

            let mut stream = entity.input_stream();
            let converted =
                match reader.read(
                    type_id,
                    &mut stream,
                    content_type.as_deref(),
                    charset.as_deref(),
                ) {
                    Ok(Some(converted)) => converted,
                    Ok(None) => continue,
                    Err(ConversionError::Io(source)) => return Err(ClientError::Io { source }),
                    Err(ConversionError::Failed(error)) => {
                        trace!(
                            reader = reader.name(),
                            error = %error,
                            "entity reader failed, trying next candidate"
                        );
                        continue;
                    }
                };

            match converted.downcast::<T>() {
                Ok(value) => return Ok(*value),
                Err(_) => {
                    trace!(
                        reader = reader.name(),
                        "entity reader produced a different type, trying next candidate"
                    );
                }
            }
        }

        Err(ClientError::UnsupportedConversion {
            type_name: std::any::type_name::<T>(),
        })
    }
}

impl std::fmt::Debug for EntityConverterManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("EntityConverterManager")
            .field(
                "writers",
                &self.writers.iter().map(|item| item.name()).collect::<Vec<_>>(),
            )
            .field(
                "readers",
                &self.readers.iter().map(|item| item.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
