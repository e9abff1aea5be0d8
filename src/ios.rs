//! Open IO spaces: the table of devices opened through the IOD registry.
//!
//! Each successful open allocates a fresh [`IosId`]; ids are never reused within a table.
//! Positioned reads and writes are forwarded to the owning device exactly once per call.

use crate::iod::{IoDevice, IodError, IodRegistry, IosFlags};
use std::fmt;
use tracing::{debug, trace};

/// Identifier of an open IO space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IosId(u32);

impl IosId {
    pub(crate) fn new(raw: u32) -> Self {
        IosId(raw)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IosId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IosError {
    #[error("no IOD recognizes handler `{0}`")]
    NoMatchingDevice(String),
    #[error("no IO space {0}")]
    NoSuchIos(IosId),
    #[error("IO space {0} is not readable")]
    NotReadable(IosId),
    #[error("IO space {0} is not writable")]
    NotWritable(IosId),
    #[error("device: {0}")]
    Iod(#[from] IodError),
}

/// One opened device.
pub struct Ios {
    id: IosId,
    handler: String,
    iod: usize,
    flags: IosFlags,
    dev: Box<dyn IoDevice>,
}

impl fmt::Debug for Ios {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ios")
            .field("id", &self.id)
            .field("handler", &self.handler)
            .field("iod", &self.iod)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl Ios {
    pub fn id(&self) -> IosId {
        self.id
    }

    /// Normalized handler the space was opened with.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// Index of the backend in the registry that opened it.
    pub fn iod_index(&self) -> usize {
        self.iod
    }

    pub fn flags(&self) -> IosFlags {
        self.flags
    }
}

/// Open IO spaces, in opening order, plus the current one.
#[derive(Debug, Default)]
pub struct IosTable {
    spaces: Vec<Ios>,
    next_id: u32,
    current: Option<IosId>,
}

impl IosTable {
    pub fn new() -> Self {
        IosTable::default()
    }

    /// Resolve `handler` against `registry` and open it. The space becomes current when
    /// `set_current` is true or when no space is current yet.
    pub fn open(
        &mut self,
        registry: &mut IodRegistry,
        handler: &str,
        flags: IosFlags,
        set_current: bool,
    ) -> Result<IosId, IosError> {
        let (index, normalized) = registry
            .resolve(handler, flags)?
            .ok_or_else(|| IosError::NoMatchingDevice(handler.to_string()))?;
        let backend = registry
            .backend_mut(index)
            .ok_or_else(|| IosError::NoMatchingDevice(handler.to_string()))?;
        let dev = backend.open(&normalized, flags)?;
        let id = IosId(self.next_id);
        self.next_id += 1;
        let dev_flags = dev.flags();
        debug!(%id, handler = %normalized, iod = backend.name(), flags = ?dev_flags, "IO space opened");
        self.spaces.push(Ios { id, handler: normalized, iod: index, flags: dev_flags, dev });
        if set_current || self.current.is_none() {
            self.current = Some(id);
        }
        Ok(id)
    }

    /// Close the space and forget it. The device is dropped even when its close fails.
    pub fn close(&mut self, id: IosId) -> Result<(), IosError> {
        let pos = self.position(id)?;
        let ios = self.spaces.remove(pos);
        if self.current == Some(id) {
            self.current = self.spaces.last().map(|s| s.id);
        }
        debug!(%id, handler = %ios.handler, "IO space closed");
        ios.dev.close()?;
        Ok(())
    }

    /// Close every space, most recent first, returning the failures.
    pub fn close_all(&mut self) -> Vec<(IosId, IosError)> {
        let mut failures = Vec::new();
        while let Some(ios) = self.spaces.last() {
            let id = ios.id;
            if let Err(e) = self.close(id) {
                failures.push((id, e));
            }
        }
        failures
    }

    fn position(&self, id: IosId) -> Result<usize, IosError> {
        self.spaces
            .iter()
            .position(|s| s.id == id)
            .ok_or(IosError::NoSuchIos(id))
    }

    pub fn get(&self, id: IosId) -> Option<&Ios> {
        self.spaces.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: IosId) -> Result<&mut Ios, IosError> {
        self.spaces
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(IosError::NoSuchIos(id))
    }

    pub fn is_open(&self, id: IosId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spaces.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = IosId> + '_ {
        self.spaces.iter().map(|s| s.id)
    }

    pub fn current(&self) -> Option<IosId> {
        self.current
    }

    pub fn set_current(&mut self, id: IosId) -> Result<(), IosError> {
        self.position(id)?;
        self.current = Some(id);
        Ok(())
    }

    /// Fill `buf` from byte `offset` of the space.
    pub fn pread(&mut self, id: IosId, offset: u64, buf: &mut [u8]) -> Result<(), IosError> {
        let ios = self.get_mut(id)?;
        if !ios.flags.contains(IosFlags::READ) {
            return Err(IosError::NotReadable(id));
        }
        trace!(%id, offset, count = buf.len(), "pread");
        ios.dev.pread(buf, offset)?;
        Ok(())
    }

    /// Write `data` at byte `offset` of the space.
    pub fn pwrite(&mut self, id: IosId, offset: u64, data: &[u8]) -> Result<(), IosError> {
        let ios = self.get_mut(id)?;
        if !ios.flags.contains(IosFlags::WRITE) {
            return Err(IosError::NotWritable(id));
        }
        trace!(%id, offset, count = data.len(), "pwrite");
        ios.dev.pwrite(data, offset)?;
        Ok(())
    }

    /// Size of the space in bytes.
    pub fn size(&self, id: IosId) -> Result<u64, IosError> {
        self.get(id)
            .map(|s| s.dev.size())
            .ok_or(IosError::NoSuchIos(id))
    }

    /// Capabilities as currently reported by the device.
    pub fn flags(&self, id: IosId) -> Result<IosFlags, IosError> {
        self.get(id)
            .map(|s| s.dev.flags())
            .ok_or(IosError::NoSuchIos(id))
    }

    pub fn flush(&mut self, id: IosId, offset: u64) -> Result<(), IosError> {
        self.get_mut(id)?.dev.flush(offset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iod::MAX_IODS;

    #[test]
    fn ids_are_not_reused() {
        let mut registry = IodRegistry::with_builtins(MAX_IODS);
        let mut table = IosTable::new();
        let a = table.open(&mut registry, "*a*", IosFlags::empty(), false).expect("open a");
        table.close(a).expect("close a");
        let b = table.open(&mut registry, "*b*", IosFlags::empty(), false).expect("open b");
        assert_ne!(a, b);
        assert!(matches!(table.close(a), Err(IosError::NoSuchIos(_))));
    }

    #[test]
    fn current_follows_opens_and_closes() {
        let mut registry = IodRegistry::with_builtins(MAX_IODS);
        let mut table = IosTable::new();
        let a = table.open(&mut registry, "*a*", IosFlags::empty(), false).expect("open a");
        let b = table.open(&mut registry, "*b*", IosFlags::empty(), false).expect("open b");
        assert_eq!(table.current(), Some(a));
        table.set_current(b).expect("set current");
        table.close(b).expect("close b");
        assert_eq!(table.current(), Some(a));
        table.close(a).expect("close a");
        assert_eq!(table.current(), None);
    }

    #[test]
    fn unknown_handler_is_rejected() {
        let mut registry = IodRegistry::with_builtins(MAX_IODS);
        let mut table = IosTable::new();
        let err = table
            .open(&mut registry, "nbd://host", IosFlags::READ, true)
            .expect_err("no backend");
        assert!(matches!(err, IosError::NoMatchingDevice(_)));
    }

    #[test]
    fn read_only_space_rejects_writes() {
        let mut registry = IodRegistry::with_builtins(MAX_IODS);
        let mut table = IosTable::new();
        let id = table.open(&mut registry, "*ro*", IosFlags::READ, true).expect("open");
        assert!(matches!(table.pwrite(id, 0, &[1]), Err(IosError::NotWritable(_))));
        let mut buf = [0xffu8; 2];
        table.pread(id, 0, &mut buf).expect("read");
        assert_eq!(buf, [0, 0]);
    }
}
