//! Named capability registry.
//!
//! Handlers obtain utility capabilities by name (`buffer` for content
//! encoding, `uuid` for unique identifiers). The registry is an explicit value
//! handed to whoever needs it; there is no process-wide instance.

use std::fmt;
use std::sync::Arc;

use crate::encoder::{Base64Encoder, ContentEncoder};
use crate::error::{CoreError, CoreResult};

/// Generates unique identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new identifier.
    fn generate(&self) -> String;
}

/// Random (v4) UUID generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// A capability handed out by the [`Library`].
#[derive(Clone)]
pub enum Capability {
    /// Byte-buffer operations, used for body encoding.
    Buffer(Arc<dyn ContentEncoder>),
    /// Unique-id generation.
    Uuid(Arc<dyn IdGenerator>),
}

impl Capability {
    /// Name under which the capability is registered.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Buffer(_) => Library::BUFFER,
            Self::Uuid(_) => Library::UUID,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Capability").field(&self.name()).finish()
    }
}

/// Registry of named capabilities.
#[derive(Clone)]
pub struct Library {
    encoder: Arc<dyn ContentEncoder>,
    ids: Arc<dyn IdGenerator>,
}

impl Library {
    /// Name of the byte-buffer capability.
    pub const BUFFER: &str = "buffer";
    /// Name of the unique-id capability.
    pub const UUID: &str = "uuid";

    /// Create a registry from explicit capability implementations.
    #[must_use]
    pub fn new(encoder: Arc<dyn ContentEncoder>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { encoder, ids }
    }

    /// Load a capability by name.
    pub fn load(&self, name: &str) -> CoreResult<Capability> {
        match name {
            Self::BUFFER => Ok(Capability::Buffer(Arc::clone(&self.encoder))),
            Self::UUID => Ok(Capability::Uuid(Arc::clone(&self.ids))),
            other => Err(CoreError::UnsupportedLibrary(other.to_owned())),
        }
    }

    /// Load the content encoder registered under [`Library::BUFFER`].
    pub fn encoder(&self) -> CoreResult<Arc<dyn ContentEncoder>> {
        match self.load(Self::BUFFER)? {
            Capability::Buffer(encoder) => Ok(encoder),
            Capability::Uuid(_) => Err(CoreError::UnsupportedLibrary(Self::BUFFER.to_owned())),
        }
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new(Arc::new(Base64Encoder), Arc::new(UuidGenerator))
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("capabilities", &[Self::BUFFER, Self::UUID])
            .finish()
    }
}
