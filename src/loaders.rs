//! Schema document resolution
//!
//! This module maps `(base system id, schema location, directive kind)` to a
//! readable document. Resolution is pluggable through [`SchemaResolver`]; the
//! crate ships a filesystem resolver confined to a base directory and an
//! in-memory resolver used by tests and embedders.

use crate::error::{Error, ErrorKind, Result};
use crate::limits::Limits;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// The directive that caused a document to be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    /// xs:include
    Include,
    /// xs:import
    Import,
    /// xs:redefine
    Redefine,
}

impl DirectiveKind {
    /// Get the directive element name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Import => "import",
            Self::Redefine => "redefine",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for one schema document
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    /// System id of the requesting document (None for a root load)
    pub base_system_id: Option<&'a str>,
    /// The schemaLocation as written
    pub location: &'a str,
    /// Directive kind (None for a root load)
    pub kind: Option<DirectiveKind>,
    /// Declared namespace of an import
    pub namespace: Option<&'a str>,
}

impl<'a> ResolveRequest<'a> {
    /// Request for a root document
    pub fn root(location: &'a str) -> Self {
        Self {
            base_system_id: None,
            location,
            kind: None,
            namespace: None,
        }
    }
}

/// A resolved, readable document
pub struct ResolvedDocument {
    /// Open reader over the document bytes
    pub reader: Box<dyn Read>,
    /// Canonical system id
    pub system_id: String,
}

impl fmt::Debug for ResolvedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedDocument")
            .field("system_id", &self.system_id)
            .finish_non_exhaustive()
    }
}

/// Pluggable document resolution
///
/// `Ok(None)` means the document was not found; the loader decides whether
/// that is fatal for the directive kind involved.
pub trait SchemaResolver: fmt::Debug + Send + Sync {
    /// Resolve a request to a document
    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<Option<ResolvedDocument>>;
}

/// Read a resolved document fully, enforcing the size limit
///
/// The reader is consumed and dropped here on every path.
pub fn read_document(document: ResolvedDocument, limits: &Limits) -> Result<(String, String)> {
    let ResolvedDocument { reader, system_id } = document;
    let mut bytes = Vec::new();
    reader
        .take(limits.max_document_size as u64 + 1)
        .read_to_end(&mut bytes)?;
    limits.check_document_size(bytes.len())?;
    let text = String::from_utf8(bytes).map_err(|e| {
        Error::schema(
            ErrorKind::Parse,
            format!("document '{}' is not valid UTF-8: {}", system_id, e),
        )
    })?;
    Ok((text, system_id))
}

// =============================================================================
// Filesystem resolver
// =============================================================================

/// Filesystem resolver confined to a base directory
#[derive(Debug, Clone)]
pub struct FileResolver {
    base_dir: PathBuf,
}

impl FileResolver {
    /// Create a resolver rooted at `base_dir`
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().canonicalize()?;
        Ok(Self { base_dir })
    }

    /// The directory every resolved document must stay inside
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn target_path(&self, request: &ResolveRequest<'_>) -> Result<PathBuf> {
        if let Ok(url) = Url::parse(request.location) {
            if url.scheme() == "file" {
                return file_url_to_path(&url);
            }
            if url.scheme().len() > 1 {
                return Err(Error::schema(
                    ErrorKind::DocumentNotFound,
                    format!("unsupported location scheme in '{}'", request.location),
                ));
            }
        }

        match request.base_system_id {
            Some(base) if base.starts_with("file:") => {
                let url = Url::parse(base)?.join(request.location)?;
                file_url_to_path(&url)
            }
            _ => {
                let path = Path::new(request.location);
                if path.is_absolute() {
                    Ok(path.to_path_buf())
                } else {
                    Ok(self.base_dir.join(path))
                }
            }
        }
    }

    fn check_inside(&self, path: &Path, location: &str) -> Result<()> {
        if path.starts_with(&self.base_dir) {
            Ok(())
        } else {
            Err(Error::schema(
                ErrorKind::DocumentNotFound,
                format!(
                    "location '{}' escapes the base directory {}",
                    location,
                    self.base_dir.display()
                ),
            ))
        }
    }
}

impl SchemaResolver for FileResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<Option<ResolvedDocument>> {
        let path = normalize_path(&self.target_path(request)?);
        self.check_inside(&path, request.location)?;
        if !path.is_file() {
            return Ok(None);
        }

        // Symlinks may still point outside
        let canonical = path.canonicalize()?;
        self.check_inside(&canonical, request.location)?;

        let system_id = Url::from_file_path(&canonical)
            .map_err(|_| {
                Error::schema(
                    ErrorKind::DocumentNotFound,
                    format!("cannot build a system id for {}", canonical.display()),
                )
            })?
            .to_string();
        let file = File::open(&canonical)?;
        Ok(Some(ResolvedDocument {
            reader: Box::new(file),
            system_id,
        }))
    }
}

fn file_url_to_path(url: &Url) -> Result<PathBuf> {
    url.to_file_path().map_err(|_| {
        Error::schema(
            ErrorKind::DocumentNotFound,
            format!("'{}' is not a local file URL", url),
        )
    })
}

/// Lexically remove `.` and `..` components
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

// =============================================================================
// In-memory resolver
// =============================================================================

/// Resolver over a fixed set of in-memory documents keyed by path
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    documents: HashMap<String, String>,
}

impl MemoryResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document under `path`
    pub fn with_document(mut self, path: impl Into<String>, text: impl Into<String>) -> Self {
        self.add_document(path, text);
        self
    }

    /// Add a document under `path`
    pub fn add_document(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.documents.insert(path.into(), text.into());
    }

    /// Number of documents held
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check whether the resolver holds no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl SchemaResolver for MemoryResolver {
    fn resolve(&self, request: &ResolveRequest<'_>) -> Result<Option<ResolvedDocument>> {
        let key = join_location(request.base_system_id, request.location)?;
        Ok(self.documents.get(&key).map(|text| ResolvedDocument {
            reader: Box::new(Cursor::new(text.clone().into_bytes())),
            system_id: key,
        }))
    }
}

/// Join a relative location onto the directory of `base`, normalizing
/// `.` and `..` segments
///
/// A `..` that climbs above the root is an escape and fails.
pub fn join_location(base: Option<&str>, location: &str) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    if !location.starts_with('/') {
        if let Some(base) = base {
            if let Some(pos) = base.rfind('/') {
                segments.extend(base[..pos].split('/').filter(|s| !s.is_empty()));
            }
        }
    }

    for segment in location.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::schema(
                        ErrorKind::DocumentNotFound,
                        format!("location '{}' escapes the document root", location),
                    ));
                }
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}
