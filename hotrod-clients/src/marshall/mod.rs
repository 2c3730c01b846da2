//! Marshallers and protobuf schema registration.
//!
//! A client carries one [`Marshaller`]. Only the proto-stream marshaller
//! takes part in schema registration: it owns a [`SerializationContext`]
//! into which [`SchemaInitializer`]s, [`FileDescriptorSource`]s and
//! [`MessageMarshaller`]s are registered at startup.

mod context;

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::ClientResult;

pub use context::{FileDescriptorSource, SerializationContext, PROTO_EXTENSION};

/// Media type of protobuf-encoded payloads.
pub const PROTOSTREAM_MEDIA_TYPE: &str = "application/x-protostream";

/// Media type of plain UTF-8 payloads.
pub const UTF8_MEDIA_TYPE: &str = "text/plain; charset=UTF-8";

/// Converts values to and from their wire representation.
pub trait Marshaller: Send + Sync + fmt::Debug {
    /// Media type of the produced payloads.
    fn media_type(&self) -> &str;

    /// Downcast to the proto-stream marshaller, if this is one.
    fn as_proto_stream(&self) -> Option<&ProtoStreamMarshaller> {
        None
    }
}

/// Encoder/decoder for one protobuf message type.
pub trait MessageMarshaller: Send + Sync + fmt::Debug {
    /// Fully-qualified protobuf message name, e.g. `library.Book`.
    fn type_name(&self) -> &str;
}

/// A schema file plus the marshallers generated for it.
pub trait SchemaInitializer: Send + Sync {
    fn proto_file_name(&self) -> &str;

    fn proto_file(&self) -> &str;

    /// Register the schema file into `ctx`.
    fn register_schema(&self, ctx: &mut SerializationContext) -> ClientResult<()> {
        ctx.register_proto_file(self.proto_file_name(), self.proto_file())
    }

    /// Register the generated message marshallers into `ctx`.
    fn register_marshallers(&self, ctx: &mut SerializationContext);
}

/// Protobuf marshaller with a shared serialization context.
#[derive(Debug, Default)]
pub struct ProtoStreamMarshaller {
    context: RwLock<SerializationContext>,
}

impl ProtoStreamMarshaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serialization_context(&self) -> RwLockReadGuard<'_, SerializationContext> {
        self.context.read()
    }

    pub fn serialization_context_mut(&self) -> RwLockWriteGuard<'_, SerializationContext> {
        self.context.write()
    }
}

impl Marshaller for ProtoStreamMarshaller {
    fn media_type(&self) -> &str {
        PROTOSTREAM_MEDIA_TYPE
    }

    fn as_proto_stream(&self) -> Option<&ProtoStreamMarshaller> {
        Some(self)
    }
}

/// Plain UTF-8 string marshaller.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8Marshaller;

impl Marshaller for Utf8Marshaller {
    fn media_type(&self) -> &str {
        UTF8_MEDIA_TYPE
    }
}

/// Schema initializer over an in-memory schema file.
#[derive(Debug, Clone)]
pub struct StaticSchemaInitializer {
    file_name: String,
    contents: String,
    marshallers: Vec<Arc<dyn MessageMarshaller>>,
}

impl StaticSchemaInitializer {
    pub fn new(file_name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
            marshallers: Vec::new(),
        }
    }

    /// Add a marshaller registered alongside the schema.
    pub fn with_marshaller(mut self, marshaller: Arc<dyn MessageMarshaller>) -> Self {
        self.marshallers.push(marshaller);
        self
    }
}

impl SchemaInitializer for StaticSchemaInitializer {
    fn proto_file_name(&self) -> &str {
        &self.file_name
    }

    fn proto_file(&self) -> &str {
        &self.contents
    }

    fn register_marshallers(&self, ctx: &mut SerializationContext) {
        for marshaller in &self.marshallers {
            ctx.register_marshaller(Arc::clone(marshaller));
        }
    }
}
