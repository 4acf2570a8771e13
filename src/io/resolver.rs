//! Resource resolution by URI.
//!
//! A [`ResourceResolver`] maps (relative) URIs to bytes. Resolvers are
//! scoped to a directory, and [`ResourceResolver::derive`] creates a
//! resolver for a subdirectory, so that relative URIs inside a subtree
//! file or an external tileset are resolved against the right base.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::GzDecoder;
use parking_lot::RwLock;

use super::resource_types::ResourceTypes;
use crate::util::{Error, Result};

/// Resolves resources by URI.
pub trait ResourceResolver: Send + Sync {
    /// Resolve the data for the given URI.
    ///
    /// Returns `Ok(None)` when the resource does not exist. An `Err`
    /// is returned when the resource exists but could not be read.
    fn resolve(&self, uri: &str) -> Result<Option<Vec<u8>>>;

    /// Create a resolver for URIs relative to `base_dir`, which is
    /// itself relative to the base of this resolver.
    fn derive(&self, base_dir: &str) -> Arc<dyn ResourceResolver>;
}

/// Whether the URI has a scheme like `http:` or `file:`.
fn has_scheme(uri: &str) -> bool {
    match uri.find(':') {
        Some(i) => {
            i > 1 && uri[..i].chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c))
        }
        None => false,
    }
}

/// Join a relative URI to a base directory, resolving `.` and `..`.
///
/// The result never starts with `/` unless the base does.
pub fn join_uri(base: &str, uri: &str) -> String {
    if has_scheme(uri) || uri.starts_with('/') {
        return uri.to_string();
    }
    let absolute = base.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(uri.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|s| *s != "..") {
                    segments.pop();
                } else if !absolute {
                    segments.push("..");
                }
            }
            s => segments.push(s),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else {
        joined
    }
}

/// The directory part of a URI (everything before the last `/`).
pub fn uri_directory(uri: &str) -> &str {
    match uri.rfind('/') {
        Some(i) => &uri[..i],
        None => "",
    }
}

/// Strip query and fragment parts and decode `%20`-style escapes.
fn clean_uri(uri: &str) -> String {
    let end = uri.find(['?', '#']).unwrap_or(uri.len());
    let uri = &uri[..end];
    let bytes = uri.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(v) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(v);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| uri.to_string())
}

// ============================================================================
// File system
// ============================================================================

/// Resolves URIs as paths relative to a directory.
#[derive(Clone, Debug)]
pub struct FileResourceResolver {
    base_dir: PathBuf,
}

impl FileResourceResolver {
    /// Files above this size are memory-mapped instead of read.
    #[cfg(feature = "mmap")]
    const MMAP_THRESHOLD: u64 = 1 << 20;

    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self { base_dir: base_dir.as_ref().to_path_buf() }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn read_file(path: &Path) -> Result<Vec<u8>> {
        #[cfg(feature = "mmap")]
        {
            let mut file = std::fs::File::open(path)?;
            let size = file.metadata()?.len();
            if size >= Self::MMAP_THRESHOLD {
                // Safety: the file is opened read-only and copied out immediately
                let mmap = unsafe { memmap2::Mmap::map(&file) }?;
                return Ok(mmap.to_vec());
            }
            let mut data = Vec::with_capacity(size as usize);
            file.read_to_end(&mut data)?;
            Ok(data)
        }
        #[cfg(not(feature = "mmap"))]
        {
            Ok(std::fs::read(path)?)
        }
    }
}

impl ResourceResolver for FileResourceResolver {
    fn resolve(&self, uri: &str) -> Result<Option<Vec<u8>>> {
        if has_scheme(uri) {
            tracing::debug!("Cannot resolve non-file URI {}", uri);
            return Ok(None);
        }
        let path = self.base_dir.join(clean_uri(uri));
        if !path.is_file() {
            tracing::debug!("Resource not found: {}", path.display());
            return Ok(None);
        }
        tracing::debug!("Resolving {}", path.display());
        Self::read_file(&path).map(Some)
    }

    fn derive(&self, base_dir: &str) -> Arc<dyn ResourceResolver> {
        Arc::new(Self::new(self.base_dir.join(clean_uri(base_dir))))
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Resolves URIs from an in-memory map of normalized paths to bytes.
///
/// Derived resolvers share the same storage.
#[derive(Clone, Default)]
pub struct MemoryResourceResolver {
    base: String,
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryResourceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store data under a URI relative to the base of this resolver.
    pub fn insert(&self, uri: &str, data: impl Into<Vec<u8>>) {
        let key = join_uri(&self.base, uri);
        self.entries.write().insert(key, data.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with(self, uri: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(uri, data);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ResourceResolver for MemoryResourceResolver {
    fn resolve(&self, uri: &str) -> Result<Option<Vec<u8>>> {
        let key = join_uri(&self.base, &clean_uri(uri));
        Ok(self.entries.read().get(&key).cloned())
    }

    fn derive(&self, base_dir: &str) -> Arc<dyn ResourceResolver> {
        Arc::new(Self {
            base: join_uri(&self.base, base_dir),
            entries: Arc::clone(&self.entries),
        })
    }
}

// ============================================================================
// Gzip
// ============================================================================

/// Wraps a resolver and inflates gzip-compressed resources.
#[derive(Clone)]
pub struct UnzippingResourceResolver {
    inner: Arc<dyn ResourceResolver>,
}

impl UnzippingResourceResolver {
    pub fn new(inner: Arc<dyn ResourceResolver>) -> Self {
        Self { inner }
    }
}

/// Inflate the data when it starts with the gzip magic bytes.
pub fn unzip_if_gzipped(data: Vec<u8>) -> Result<Vec<u8>> {
    if !ResourceTypes::is_gzipped(&data) {
        return Ok(data);
    }
    let mut decoder = GzDecoder::new(data.as_slice());
    let mut inflated = Vec::with_capacity(data.len() * 4);
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| Error::invalid(format!("Could not inflate gzipped data: {}", e)))?;
    Ok(inflated)
}

impl ResourceResolver for UnzippingResourceResolver {
    fn resolve(&self, uri: &str) -> Result<Option<Vec<u8>>> {
        match self.inner.resolve(uri)? {
            Some(data) => unzip_if_gzipped(data).map(Some),
            None => Ok(None),
        }
    }

    fn derive(&self, base_dir: &str) -> Arc<dyn ResourceResolver> {
        Arc::new(Self::new(self.inner.derive(base_dir)))
    }
}
