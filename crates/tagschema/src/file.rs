//! File upload capability
//!
//! A type that can load itself from an uploaded file maps to the `File`
//! kind, whatever its structural shape.

use std::io::{self, Read};

use crate::reflect::{Reflect, Value, ValueMut};

/// Header of one uploaded file, supplied by the transport layer
pub trait UploadHeader {
    fn filename(&self) -> &str;

    fn open(&self) -> io::Result<Box<dyn Read + '_>>;
}

/// A value that can read itself from an upload
pub trait UploadReadable {
    fn read_upload(&mut self, header: &dyn UploadHeader) -> io::Result<()>;
}

/// Raw bytes of an uploaded file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileData(pub Vec<u8>);

impl FileData {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl UploadReadable for FileData {
    fn read_upload(&mut self, header: &dyn UploadHeader) -> io::Result<()> {
        let mut reader = header.open()?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        tracing::trace!(filename = header.filename(), bytes = data.len(), "read upload");
        self.0 = data;
        Ok(())
    }
}

impl Reflect for FileData {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn value(&self) -> Value<'_> {
        Value::Seq(&self.0)
    }

    fn value_mut(&mut self) -> ValueMut<'_> {
        ValueMut::Opaque
    }

    fn is_upload(&self) -> bool {
        true
    }

    fn as_upload_mut(&mut self) -> Option<&mut dyn UploadReadable> {
        Some(self)
    }
}
