//! Schema registration with the marshaller and the server.
//!
//! Callers describe a client's schemas up front with a
//! [`SchemaRegistration`]. When the client uses a proto-stream marshaller,
//! [`register_with_marshaller`] loads them into its serialization context
//! and caches every file into the property bag under
//! [`PROTOBUF_FILE_PREFIX`](crate::properties::PROTOBUF_FILE_PREFIX). Once a
//! connection manager exists, [`push_schemas`] writes the collected files
//! into the server's protobuf metadata cache.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{RemoteCacheManager, RemoteError, PROTOBUF_METADATA_CACHE_NAME};
use crate::error::{ClientError, ClientResult};
use crate::marshall::{
    FileDescriptorSource, MessageMarshaller, ProtoStreamMarshaller, SchemaInitializer,
};
use crate::properties::Properties;

/// Schemas and marshallers supplied for one client at startup.
#[derive(Clone, Default)]
pub struct SchemaRegistration {
    initializers: Vec<Arc<dyn SchemaInitializer>>,
    descriptor_sources: Vec<FileDescriptorSource>,
    message_marshallers: Vec<Arc<dyn MessageMarshaller>>,
}

impl fmt::Debug for SchemaRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .initializers
            .iter()
            .map(|i| i.proto_file_name())
            .collect();
        f.debug_struct("SchemaRegistration")
            .field("initializers", &names)
            .field("descriptor_sources", &self.descriptor_sources)
            .field("message_marshallers", &self.message_marshallers)
            .finish()
    }
}

impl SchemaRegistration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initializer(mut self, initializer: Arc<dyn SchemaInitializer>) -> Self {
        self.initializers.push(initializer);
        self
    }

    pub fn with_descriptor_source(mut self, source: FileDescriptorSource) -> Self {
        self.descriptor_sources.push(source);
        self
    }

    pub fn with_message_marshaller(mut self, marshaller: Arc<dyn MessageMarshaller>) -> Self {
        self.message_marshallers.push(marshaller);
        self
    }

    pub fn add_initializer(&mut self, initializer: Arc<dyn SchemaInitializer>) {
        self.initializers.push(initializer);
    }

    pub fn add_descriptor_source(&mut self, source: FileDescriptorSource) {
        self.descriptor_sources.push(source);
    }

    pub fn add_message_marshaller(&mut self, marshaller: Arc<dyn MessageMarshaller>) {
        self.message_marshallers.push(marshaller);
    }

    pub fn initializers(&self) -> &[Arc<dyn SchemaInitializer>] {
        &self.initializers
    }

    pub fn descriptor_sources(&self) -> &[FileDescriptorSource] {
        &self.descriptor_sources
    }

    pub fn message_marshallers(&self) -> &[Arc<dyn MessageMarshaller>] {
        &self.message_marshallers
    }

    pub fn is_empty(&self) -> bool {
        self.initializers.is_empty()
            && self.descriptor_sources.is_empty()
            && self.message_marshallers.is_empty()
    }
}

/// Load a client's schemas into a proto-stream marshaller.
///
/// Every registered schema file also ends up in `properties` under the
/// reserved prefix, so it can be pushed to the server later. Schema files
/// already present in `properties` are registered too.
pub fn register_with_marshaller(
    marshaller: &ProtoStreamMarshaller,
    schemas: &SchemaRegistration,
    properties: &mut Properties,
) -> ClientResult<()> {
    let mut ctx = marshaller.serialization_context_mut();

    for initializer in &schemas.initializers {
        initializer.register_schema(&mut ctx)?;
        initializer.register_marshallers(&mut ctx);
        properties.insert_schema_file(initializer.proto_file_name(), initializer.proto_file());
    }

    let mut embedded = FileDescriptorSource::new();
    for (name, contents) in properties.schema_files() {
        embedded.add_proto_file(name, contents);
    }
    if !embedded.is_empty() {
        ctx.register_proto_files(&embedded)?;
    }

    for source in &schemas.descriptor_sources {
        ctx.register_proto_files(source)?;
        for (name, contents) in source.files() {
            properties.insert_schema_file(name, contents.as_str());
        }
    }

    for marshaller in &schemas.message_marshallers {
        ctx.register_marshaller(Arc::clone(marshaller));
    }

    debug!(
        files = ctx.file_count(),
        marshallers = ctx.marshaller_count(),
        "Registered schemas with proto-stream marshaller"
    );
    Ok(())
}

/// Schema files to write to the server, each name once.
///
/// Initializer files come first; embedded files from `properties` follow
/// unless an initializer already supplied the same name.
pub fn collect_schema_files(
    schemas: &SchemaRegistration,
    properties: &Properties,
) -> Vec<(String, String)> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    let from_initializers = schemas
        .initializers
        .iter()
        .map(|i| (i.proto_file_name(), i.proto_file()));

    for (name, contents) in from_initializers.chain(properties.schema_files()) {
        if seen.insert(name.to_string()) {
            files.push((name.to_string(), contents.to_string()));
        }
    }
    files
}

/// Write schema files into the server's protobuf metadata cache.
///
/// The metadata cache is only opened when there is something to write.
/// The first failed write aborts the push. Returns the number of files
/// written.
pub fn push_schemas(
    manager: &dyn RemoteCacheManager,
    files: &[(String, String)],
) -> ClientResult<usize> {
    let Some((first, _)) = files.first() else {
        return Ok(0);
    };

    let metadata = manager
        .cache(PROTOBUF_METADATA_CACHE_NAME)
        .and_then(|cache| {
            cache.ok_or_else(|| RemoteError::Rejected {
                cache: PROTOBUF_METADATA_CACHE_NAME.to_string(),
                reason: "metadata cache is not available".to_string(),
            })
        })
        .map_err(|source| ClientError::SchemaPush {
            file: first.clone(),
            source,
        })?;

    for (name, contents) in files {
        metadata
            .put(name, contents.clone().into_bytes())
            .map_err(|source| ClientError::SchemaPush {
                file: name.clone(),
                source,
            })?;
        debug!(file = %name, "Registered schema on server");
    }

    info!(files = files.len(), "Registered schemas in protobuf metadata cache");
    Ok(files.len())
}
