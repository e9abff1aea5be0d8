//! File-backed devices: plain paths or `file://` URLs.

use super::{IoDevice, Iod, IodError, IosFlags};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Backend for files on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileIod;

impl Iod for FileIod {
    fn name(&self) -> &str {
        "file"
    }

    /// `file://` URLs are always accepted. Plain handlers are accepted only when they
    /// name an existing path or the open asks to create one, leaving other plain
    /// handlers to backends registered later.
    fn normalize(&self, handler: &str, flags: IosFlags) -> Result<Option<String>, IodError> {
        if let Some(path) = handler.strip_prefix("file://") {
            return Ok((!path.is_empty()).then(|| path.to_string()));
        }
        if handler.is_empty() || handler.contains("://") {
            return Ok(None);
        }
        let creating = flags.contains(IosFlags::WRITE | IosFlags::CREATE);
        Ok((creating || Path::new(handler).exists()).then(|| handler.to_string()))
    }

    fn open(&mut self, handler: &str, flags: IosFlags) -> Result<Box<dyn IoDevice>, IodError> {
        let mode = flags & (IosFlags::READ | IosFlags::WRITE);
        let (file, flags) = if mode.is_empty() {
            // No mode asked for: read-write when permitted, else read-only.
            match open_with(handler, IosFlags::READ | IosFlags::WRITE | flags) {
                Ok(file) => (file, IosFlags::READ | IosFlags::WRITE),
                Err(_) => (open_with(handler, IosFlags::READ | flags)?, IosFlags::READ),
            }
        } else {
            (open_with(handler, flags)?, mode)
        };
        Ok(Box::new(FileDevice { file, flags }))
    }
}

fn open_with(path: &str, flags: IosFlags) -> io::Result<File> {
    OpenOptions::new()
        .read(flags.contains(IosFlags::READ))
        .write(flags.contains(IosFlags::WRITE))
        .create(flags.contains(IosFlags::WRITE) && flags.contains(IosFlags::CREATE))
        .truncate(flags.contains(IosFlags::WRITE) && flags.contains(IosFlags::TRUNCATE))
        .open(path)
}

#[derive(Debug)]
pub struct FileDevice {
    file: File,
    flags: IosFlags,
}

impl IoDevice for FileDevice {
    fn pread(&mut self, buf: &mut [u8], offset: u64) -> Result<(), IodError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => IodError::Eof,
            _ => IodError::Io(e),
        })
    }

    fn pwrite(&mut self, buf: &[u8], offset: u64) -> Result<(), IodError> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }

    fn flags(&self) -> IosFlags {
        self.flags
    }

    fn flush(&mut self, _offset: u64) -> Result<(), IodError> {
        self.file.flush()?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), IodError> {
        if self.flags.contains(IosFlags::WRITE) {
            self.file.sync_all()?;
        }
        Ok(())
    }
}
