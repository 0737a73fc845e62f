use std::io::{self, Cursor, Read};

use bytes::Bytes;

use crate::error::Error;
use crate::util::join_content_type;

pub(crate) type EntityStream = Box<dyn Read + Send + Sync>;

enum EntitySource {
    Stream(EntityStream),
    Buffered(Bytes),
    Closed,
}

/// A request or response body: a byte stream plus optional content type and charset.
///
/// Until [`Entity::buffer`] is called the stream is single-use. Afterwards every call to
/// [`Entity::input_stream`] yields a fresh reader over the same bytes.
pub struct Entity {
    source: EntitySource,
    content_type: Option<String>,
    charset: Option<String>,
}

fn read_first_byte(reader: &mut dyn Read) -> io::Result<Option<u8>> {
    let mut first = [0_u8; 1];
    loop {
        match reader.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => return Ok(Some(first[0])),
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error),
        }
    }
}

impl Entity {
    pub fn new<R>(reader: R) -> crate::Result<Self>
    where
        R: Read + Send + Sync + 'static,
    {
        Self::with_metadata(reader, None, None)
    }

    pub fn with_content_type<R>(reader: R, content_type: &str) -> crate::Result<Self>
    where
        R: Read + Send + Sync + 'static,
    {
        Self::with_metadata(reader, Some(content_type), None)
    }

    /// Fails with [`Error::EmptyEntity`] when the reader yields no bytes on its first read.
    pub fn with_metadata<R>(
        mut reader: R,
        content_type: Option<&str>,
        charset: Option<&str>,
    ) -> crate::Result<Self>
    where
        R: Read + Send + Sync + 'static,
    {
        let Some(first) = read_first_byte(&mut reader)? else {
            return Err(Error::EmptyEntity);
        };

        Ok(Self {
            source: EntitySource::Stream(Box::new(Cursor::new([first]).chain(reader))),
            content_type: content_type.map(ToOwned::to_owned),
            charset: charset.map(ToOwned::to_owned),
        })
    }

    /// Like [`Entity::with_metadata`], failing with [`Error::NullEntity`] when no reader is given.
    pub fn from_reader<R>(
        reader: Option<R>,
        content_type: Option<&str>,
        charset: Option<&str>,
    ) -> crate::Result<Self>
    where
        R: Read + Send + Sync + 'static,
    {
        let Some(reader) = reader else {
            return Err(Error::NullEntity);
        };
        Self::with_metadata(reader, content_type, charset)
    }

    /// Builds an already buffered entity.
    pub fn from_bytes(
        bytes: impl Into<Bytes>,
        content_type: Option<&str>,
        charset: Option<&str>,
    ) -> crate::Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(Error::EmptyEntity);
        }
        Ok(Self {
            source: EntitySource::Buffered(bytes),
            content_type: content_type.map(ToOwned::to_owned),
            charset: charset.map(ToOwned::to_owned),
        })
    }

    pub(crate) fn from_stream(
        stream: EntityStream,
        content_type: Option<&str>,
        charset: Option<&str>,
    ) -> crate::Result<Self> {
        Self::with_metadata(stream, content_type, charset)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn set_content_type(&mut self, content_type: Option<&str>) {
        self.content_type = content_type.map(ToOwned::to_owned);
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn set_charset(&mut self, charset: Option<&str>) {
        self.charset = charset.map(ToOwned::to_owned);
    }

    /// Header-ready content type, `application/octet-stream` when none was set.
    pub fn full_content_type(&self) -> String {
        join_content_type(self.content_type(), self.charset())
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.source, EntitySource::Buffered(_))
    }

    pub fn buffered_bytes(&self) -> Option<&Bytes> {
        match &self.source {
            EntitySource::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Reader over the entity. Fresh on every call once buffered, otherwise the
    /// underlying stream itself, which consuming exhausts.
    pub fn input_stream(&mut self) -> Box<dyn Read + Send + Sync + '_> {
        match &mut self.source {
            EntitySource::Buffered(bytes) => Box::new(Cursor::new(bytes.clone())),
            EntitySource::Stream(stream) => Box::new(stream),
            EntitySource::Closed => Box::new(io::empty()),
        }
    }

    /// Drains the stream into memory and releases it. Calling it again is a no-op.
    pub fn buffer(&mut self) -> crate::Result<()> {
        if let EntitySource::Stream(stream) = &mut self.source {
            let mut collected = Vec::new();
            stream.read_to_end(&mut collected)?;
            self.source = EntitySource::Buffered(Bytes::from(collected));
        }
        Ok(())
    }

    /// A new entity over the same buffered bytes and metadata, `None` when not buffered.
    pub fn replay(&self) -> Option<Entity> {
        let bytes = self.buffered_bytes()?;
        Some(Self {
            source: EntitySource::Buffered(bytes.clone()),
            content_type: self.content_type.clone(),
            charset: self.charset.clone(),
        })
    }

    /// Up to `limit` leading bytes, leaving them readable afterwards.
    pub fn preview(&mut self, limit: usize) -> crate::Result<Vec<u8>> {
        match std::mem::replace(&mut self.source, EntitySource::Closed) {
            EntitySource::Buffered(bytes) => {
                let prefix = bytes[..bytes.len().min(limit)].to_vec();
                self.source = EntitySource::Buffered(bytes);
                Ok(prefix)
            }
            EntitySource::Stream(mut stream) => {
                let mut prefix = Vec::new();
                let result = stream
                    .by_ref()
                    .take(limit as u64)
                    .read_to_end(&mut prefix);
                self.source =
                    EntitySource::Stream(Box::new(Cursor::new(prefix.clone()).chain(stream)));
                result?;
                Ok(prefix)
            }
            EntitySource::Closed => Ok(Vec::new()),
        }
    }

    /// Releases the underlying stream. Further reads yield nothing.
    pub fn close(&mut self) {
        self.source = EntitySource::Closed;
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.source, EntitySource::Closed)
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.source {
            EntitySource::Stream(_) => "stream",
            EntitySource::Buffered(_) => "buffered",
            EntitySource::Closed => "closed",
        };
        formatter
            .debug_struct("Entity")
            .field("state", &state)
            .field("content_type", &self.content_type)
            .field("charset", &self.charset)
            .finish()
    }
}
