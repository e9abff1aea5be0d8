//! Memory-backed devices, named `*name*`.

use super::{IoDevice, Iod, IodError, IosFlags};

/// Initial size of a memory device, and the step it grows by.
pub const MEM_STEP: usize = 4096;

/// Backend for in-memory buffers.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemIod;

impl Iod for MemIod {
    fn name(&self) -> &str {
        "mem"
    }

    fn normalize(&self, handler: &str, _flags: IosFlags) -> Result<Option<String>, IodError> {
        let accepted = handler.len() >= 2 && handler.starts_with('*') && handler.ends_with('*');
        Ok(accepted.then(|| handler.to_string()))
    }

    fn open(&mut self, _handler: &str, flags: IosFlags) -> Result<Box<dyn IoDevice>, IodError> {
        let mode = flags & (IosFlags::READ | IosFlags::WRITE);
        let flags = if mode.is_empty() { IosFlags::READ | IosFlags::WRITE } else { mode };
        Ok(Box::new(MemDevice { data: vec![0; MEM_STEP], flags }))
    }
}

/// Growable zero-filled buffer. Reads past the end fail; writes past the end grow it.
#[derive(Debug)]
pub struct MemDevice {
    data: Vec<u8>,
    flags: IosFlags,
}

impl MemDevice {
    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}

impl IoDevice for MemDevice {
    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<(), IodError> {
        let start = usize::try_from(offset).map_err(|_| IodError::Eof)?;
        let end = start.checked_add(buf.len()).ok_or(IodError::Eof)?;
        let src = self.data.get(start..end).ok_or(IodError::Eof)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn pwrite(&mut self, buf: &[u8], offset: u64) -> Result<(), IodError> {
        let start = usize::try_from(offset).map_err(|_| IodError::NoMem)?;
        let end = start.checked_add(buf.len()).ok_or(IodError::NoMem)?;
        if end > self.data.len() {
            let new_len = end.div_ceil(MEM_STEP) * MEM_STEP;
            self.data.try_reserve(new_len - self.data.len()).map_err(|_| IodError::NoMem)?;
            self.data.resize(new_len, 0);
        }
        self.data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn flags(&self) -> IosFlags {
        self.flags
    }

    fn flush(&mut self, _offset: u64) -> Result<(), IodError> {
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), IodError> {
        Ok(())
    }
}
