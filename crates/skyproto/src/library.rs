//! Script-facing module surface
//!
//! A [`ProtoLibrary`] owns one descriptor pool, supplied by the embedding
//! host, and resolves files and symbols into descriptor proxies. Proxies
//! are cached per descriptor identity, so repeated lookups share the same
//! lazily built child index.

use std::cell::RefCell;

use prost_reflect::DescriptorPool;
use prost_types::FileDescriptorSet;
use rustc_hash::FxHashMap;

use crate::descriptor::{DescriptorProxy, DescriptorRef};
use crate::error::{Error, Result};

/// The descriptor resolver exposed to scripts.
pub struct ProtoLibrary {
    pool: DescriptorPool,
    cache: RefCell<FxHashMap<String, DescriptorProxy>>,
}

impl ProtoLibrary {
    /// Wrap an already-built descriptor pool
    pub fn from_pool(pool: DescriptorPool) -> Self {
        ProtoLibrary {
            pool,
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    /// Build a library from a file descriptor set
    pub fn from_file_descriptor_set(file_descriptor_set: FileDescriptorSet) -> Result<Self> {
        let pool =
            DescriptorPool::from_file_descriptor_set(file_descriptor_set).map_err(|err| {
                Error::Descriptor {
                    symbol: err.to_string(),
                }
            })?;
        Ok(Self::from_pool(pool))
    }

    /// Build a library from an encoded file descriptor set
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let pool = DescriptorPool::decode(bytes).map_err(|err| Error::Descriptor {
            symbol: err.to_string(),
        })?;
        Ok(Self::from_pool(pool))
    }

    /// The underlying descriptor pool
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    fn cached(&self, key: String, build: impl FnOnce() -> DescriptorProxy) -> DescriptorProxy {
        self.cache
            .borrow_mut()
            .entry(key)
            .or_insert_with(build)
            .clone()
    }

    /// Resolve a file by path into a file descriptor proxy
    pub fn file(&self, path: &str) -> Result<DescriptorProxy> {
        let file = self
            .pool
            .get_file_by_name(path)
            .ok_or_else(|| Error::Descriptor {
                symbol: path.to_string(),
            })?;
        Ok(self.cached(format!("file:{}", path), || DescriptorProxy::from_file(file)))
    }

    /// Resolve a message or enum full name into a constructible descriptor
    /// proxy
    pub fn new(&self, full_name: &str) -> Result<DescriptorProxy> {
        if let Some(message) = self.pool.get_message_by_name(full_name) {
            return Ok(self.cached(format!("sym:{}", full_name), || {
                DescriptorProxy::from_message(message)
            }));
        }
        if let Some(enumeration) = self.pool.get_enum_by_name(full_name) {
            return Ok(self.cached(format!("sym:{}", full_name), || {
                DescriptorProxy::from_enum(enumeration)
            }));
        }
        Err(Error::Descriptor {
            symbol: full_name.to_string(),
        })
    }

    /// Resolve any symbol full name: a message, enum, or service
    pub fn lookup(&self, full_name: &str) -> Result<DescriptorProxy> {
        if let Some(service) = self.pool.get_service_by_name(full_name) {
            return Ok(self.cached(format!("sym:{}", full_name), || {
                DescriptorProxy::new(DescriptorRef::Service(service))
            }));
        }
        self.new(full_name)
    }
}

impl std::fmt::Debug for ProtoLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtoLibrary")
            .field("files", &self.pool.files().count())
            .finish()
    }
}
