//! Serialization context and schema file sources.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::MessageMarshaller;
use crate::error::{ClientError, ClientResult};

/// Extension every schema file name must carry.
pub const PROTO_EXTENSION: &str = ".proto";

/// Registered schema files and message marshallers.
#[derive(Debug, Default)]
pub struct SerializationContext {
    files: BTreeMap<String, String>,
    marshallers: BTreeMap<String, Arc<dyn MessageMarshaller>>,
}

impl SerializationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one schema file, replacing an earlier file of the same name.
    pub fn register_proto_file(&mut self, name: &str, contents: &str) -> ClientResult<()> {
        let stem = name.strip_suffix(PROTO_EXTENSION).unwrap_or_default();
        if stem.is_empty() || stem.ends_with('/') {
            return Err(ClientError::InvalidSchema {
                file: name.to_string(),
                reason: format!("file name must end with {}", PROTO_EXTENSION),
            });
        }

        if let Some(previous) = self.files.insert(name.to_string(), contents.to_string()) {
            if previous != contents {
                debug!(file = name, "Replaced registered schema file");
            }
        }
        Ok(())
    }

    /// Register every file of a source.
    pub fn register_proto_files(&mut self, source: &FileDescriptorSource) -> ClientResult<()> {
        for (name, contents) in source.files() {
            self.register_proto_file(name, contents)?;
        }
        Ok(())
    }

    /// Register a message marshaller under its type name.
    pub fn register_marshaller(&mut self, marshaller: Arc<dyn MessageMarshaller>) {
        let type_name = marshaller.type_name().to_string();
        if self.marshallers.insert(type_name.clone(), marshaller).is_some() {
            debug!(type_name = %type_name, "Replaced registered message marshaller");
        }
    }

    pub fn proto_file(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Registered schema files as `(name, contents)` in name order.
    pub fn proto_files(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn can_marshall(&self, type_name: &str) -> bool {
        self.marshallers.contains_key(type_name)
    }

    pub fn marshaller(&self, type_name: &str) -> Option<&Arc<dyn MessageMarshaller>> {
        self.marshallers.get(type_name)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn marshaller_count(&self) -> usize {
        self.marshallers.len()
    }
}

/// A named set of schema files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDescriptorSource {
    files: BTreeMap<String, String>,
}

impl FileDescriptorSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_proto_file(
        &mut self,
        name: impl Into<String>,
        contents: impl Into<String>,
    ) -> &mut Self {
        self.files.insert(name.into(), contents.into());
        self
    }

    pub fn with_proto_file(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.add_proto_file(name, contents);
        self
    }

    /// Load every `*.proto` file directly inside `dir`.
    ///
    /// Files are keyed by their file name. Subdirectories are not searched.
    pub fn from_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let dir_str = dir.to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("non UTF-8 schema directory: {}", dir.display()),
            )
        })?;
        let pattern = format!("{}/*{}", glob::Pattern::escape(dir_str), PROTO_EXTENSION);

        let entries = glob::glob(&pattern)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let mut source = Self::new();
        for entry in entries {
            let path = entry.map_err(glob::GlobError::into_error)?;
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let contents = std::fs::read_to_string(&path)?;
            source.add_proto_file(name, contents);
        }

        debug!(dir = %dir.display(), files = source.len(), "Loaded schema files");
        Ok(source)
    }

    pub fn files(&self) -> &BTreeMap<String, String> {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct BookMarshaller;

    impl MessageMarshaller for BookMarshaller {
        fn type_name(&self) -> &str {
            "library.Book"
        }
    }

    #[test]
    fn test_register_proto_file_requires_extension() {
        let mut ctx = SerializationContext::new();
        assert!(ctx.register_proto_file("library.proto", "package library;").is_ok());
        assert!(matches!(
            ctx.register_proto_file("library.txt", "package library;"),
            Err(ClientError::InvalidSchema { .. })
        ));
        assert!(ctx.register_proto_file(".proto", "").is_err());
        assert_eq!(ctx.file_count(), 1);
    }

    #[test]
    fn test_register_proto_file_replaces() {
        let mut ctx = SerializationContext::new();
        ctx.register_proto_file("a.proto", "v1").unwrap();
        ctx.register_proto_file("a.proto", "v2").unwrap();
        assert_eq!(ctx.proto_file("a.proto"), Some("v2"));
        assert_eq!(ctx.file_count(), 1);
    }

    #[test]
    fn test_register_marshaller() {
        let mut ctx = SerializationContext::new();
        ctx.register_marshaller(Arc::new(BookMarshaller));
        ctx.register_marshaller(Arc::new(BookMarshaller));
        assert!(ctx.can_marshall("library.Book"));
        assert!(!ctx.can_marshall("library.Author"));
        assert_eq!(ctx.marshaller_count(), 1);
    }

    #[test]
    fn test_register_proto_files_from_source() {
        let source = FileDescriptorSource::new()
            .with_proto_file("a.proto", "package a;")
            .with_proto_file("b.proto", "package b;");
        let mut ctx = SerializationContext::new();
        ctx.register_proto_files(&source).unwrap();

        let names: Vec<_> = ctx.proto_files().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.proto", "b.proto"]);
    }

    #[test]
    fn test_from_dir_loads_only_proto_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("library.proto"), "package library;").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/deep.proto"), "package deep;").unwrap();

        let source = FileDescriptorSource::from_dir(dir.path()).unwrap();
        assert_eq!(source.len(), 1);
        assert_eq!(
            source.files().get("library.proto").map(String::as_str),
            Some("package library;")
        );
    }

    #[test]
    fn test_from_dir_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileDescriptorSource::from_dir(dir.path().join("absent")).unwrap();
        assert!(source.is_empty());
    }
}
