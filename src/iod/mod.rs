//! IO devices: the backend traits, open flags, and the ordered backend registry.
//!
//! An [`Iod`] is a backend that recognizes handler strings and opens devices for them; the
//! [`IoDevice`] it returns performs positioned byte IO. Backends are consulted in registration
//! order: the first one whose [`Iod::normalize`] accepts a handler opens it. Built-in and
//! third-party backends go through the same path.

mod file;
mod mem;

pub use file::{FileDevice, FileIod};
pub use mem::{MemDevice, MemIod};

use std::fmt;
use tracing::debug;

bitflags::bitflags! {
    /// Open mode requested for a device, and capabilities reported by an opened one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IosFlags: u64 {
        const READ = 1;
        const WRITE = 2;
        const CREATE = 4;
        const TRUNCATE = 8;
    }
}

/// Status of a failed device operation.
#[derive(Debug, thiserror::Error)]
pub enum IodError {
    #[error("out of memory")]
    NoMem,
    #[error("end of device")]
    Eof,
    #[error("invalid flags")]
    Flags,
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Device(String),
}

/// An opened device. Offsets are absolute byte offsets into the device.
pub trait IoDevice {
    /// Fill `buf` from `offset`.
    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<(), IodError>;

    /// Write all of `buf` at `offset`.
    fn pwrite(&mut self, buf: &[u8], offset: u64) -> Result<(), IodError>;

    /// Size of the device in bytes.
    fn size(&self) -> u64;

    /// Capabilities of the device (`READ` and/or `WRITE`).
    fn flags(&self) -> IosFlags;

    /// Flush buffered data up to `offset`.
    fn flush(&mut self, offset: u64) -> Result<(), IodError>;

    fn close(self: Box<Self>) -> Result<(), IodError>;
}

/// A device backend.
///
/// The backend's own state plays the role of user data: it is available through `self` in
/// every call.
pub trait Iod {
    /// Interface name, unique within a registry.
    fn name(&self) -> &str;

    /// Canonical form of `handler` if this backend handles it, `None` to decline.
    fn normalize(&self, handler: &str, flags: IosFlags) -> Result<Option<String>, IodError>;

    /// Open the device named by an already normalized handler.
    fn open(&mut self, handler: &str, flags: IosFlags) -> Result<Box<dyn IoDevice>, IodError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("IOD registry is full ({0} backends)")]
    Full(usize),
    #[error("an IOD named `{0}` is already registered")]
    Duplicate(String),
}

/// Default capacity of a registry.
pub const MAX_IODS: usize = 32;

/// Ordered set of device backends.
pub struct IodRegistry {
    backends: Vec<Box<dyn Iod>>,
    capacity: usize,
}

impl fmt::Debug for IodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IodRegistry")
            .field("backends", &self.names().collect::<Vec<_>>())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl IodRegistry {
    /// Empty registry holding at most `capacity` backends.
    pub fn new(capacity: usize) -> Self {
        IodRegistry { backends: Vec::new(), capacity }
    }

    /// Registry with the memory and file backends registered, in that order.
    pub fn with_builtins(capacity: usize) -> Self {
        let builtins: Vec<Box<dyn Iod>> = vec![Box::new(MemIod), Box::new(FileIod)];
        let mut registry = IodRegistry::new(capacity.max(builtins.len()));
        registry.backends = builtins;
        registry
    }

    pub fn register(&mut self, iod: Box<dyn Iod>) -> Result<(), RegistryError> {
        if self.backends.len() >= self.capacity {
            return Err(RegistryError::Full(self.capacity));
        }
        if self.backends.iter().any(|b| b.name() == iod.name()) {
            return Err(RegistryError::Duplicate(iod.name().to_string()));
        }
        debug!(name = iod.name(), index = self.backends.len(), "IOD registered");
        self.backends.push(iod);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.backends.iter().map(|b| b.name())
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.backends.get(index).map(|b| b.name())
    }

    /// Find the first backend accepting `handler`: its index and the normalized handler.
    pub fn resolve(&self, handler: &str, flags: IosFlags) -> Result<Option<(usize, String)>, IodError> {
        for (index, backend) in self.backends.iter().enumerate() {
            if let Some(normalized) = backend.normalize(handler, flags)? {
                debug!(handler, backend = backend.name(), %normalized, "handler resolved");
                return Ok(Some((index, normalized)));
            }
        }
        Ok(None)
    }

    pub(crate) fn backend_mut(&mut self, index: usize) -> Option<&mut (dyn Iod + 'static)> {
        self.backends.get_mut(index).map(|b| b.as_mut())
    }
}
