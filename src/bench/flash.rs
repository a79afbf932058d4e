//! Configuration sector backends with NOR flash semantics: erasing sets every
//! byte to `0xFF` and programming can only clear bits.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::hal::{ConfigFlash, HalError};

const ERASED: u8 = 0xFF;

fn check_len(len: usize, sector_size: usize) -> Result<(), HalError> {
    if len > sector_size {
        return Err(HalError::Device(format!(
            "access of {} bytes exceeds {}-byte sector",
            len, sector_size
        )));
    }
    Ok(())
}

/// Sector kept in a file so calibration survives bench restarts.
#[derive(Debug)]
pub struct FileFlash {
    file: File,
    sector_size: usize,
}

impl FileFlash {
    /// Opens the backing file, creating an erased sector if it is missing or
    /// has the wrong size.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can not be opened or initialized.
    pub fn open<P: AsRef<Path>>(path: P, sector_size: usize) -> Result<Self, HalError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut flash = Self { file, sector_size };
        if flash.file.metadata()?.len() != sector_size as u64 {
            info!("Initializing flash sector at {}", path.display());
            flash.file.set_len(0)?;
            flash.erase()?;
        }
        Ok(flash)
    }
}

impl ConfigFlash for FileFlash {
    fn read(&self, buf: &mut [u8]) -> Result<(), HalError> {
        check_len(buf.len(), self.sector_size)?;
        let mut file = &self.file;
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn erase(&mut self) -> Result<(), HalError> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&vec![ERASED; self.sector_size])?;
        self.file.sync_data()?;
        Ok(())
    }

    fn program(&mut self, data: &[u8]) -> Result<(), HalError> {
        check_len(data.len(), self.sector_size)?;
        let mut current = vec![0u8; data.len()];
        self.read(&mut current)?;
        for (cell, &byte) in current.iter_mut().zip(data) {
            *cell &= byte;
        }
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&current)?;
        self.file.sync_data()?;
        Ok(())
    }
}

#[derive(Debug)]
struct RamState {
    data: Vec<u8>,
    erases: usize,
    programs: usize,
}

/// In-memory sector that counts erase and program cycles.
///
/// Clones share the same sector.
#[derive(Debug, Clone)]
pub struct RamFlash {
    state: Arc<Mutex<RamState>>,
}

impl RamFlash {
    /// Creates an erased sector.
    #[must_use]
    pub fn new(sector_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(RamState {
                data: vec![ERASED; sector_size],
                erases: 0,
                programs: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrites the start of the sector directly, bypassing NOR rules and
    /// the cycle counters.
    pub fn write_raw(&self, bytes: &[u8]) {
        let mut state = self.lock();
        let len = bytes.len().min(state.data.len());
        state.data[..len].copy_from_slice(&bytes[..len]);
    }

    #[must_use]
    pub fn contents(&self) -> Vec<u8> {
        self.lock().data.clone()
    }

    #[must_use]
    pub fn erase_count(&self) -> usize {
        self.lock().erases
    }

    #[must_use]
    pub fn program_count(&self) -> usize {
        self.lock().programs
    }
}

impl ConfigFlash for RamFlash {
    fn read(&self, buf: &mut [u8]) -> Result<(), HalError> {
        let state = self.lock();
        check_len(buf.len(), state.data.len())?;
        buf.copy_from_slice(&state.data[..buf.len()]);
        Ok(())
    }

    fn erase(&mut self) -> Result<(), HalError> {
        let mut state = self.lock();
        state.data.fill(ERASED);
        state.erases += 1;
        Ok(())
    }

    fn program(&mut self, data: &[u8]) -> Result<(), HalError> {
        let mut state = self.lock();
        check_len(data.len(), state.data.len())?;
        for (cell, &byte) in state.data.iter_mut().zip(data) {
            *cell &= byte;
        }
        state.programs += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ram_flash_program_only_clears_bits() {
        let mut flash = RamFlash::new(16);
        flash.program(&[0x0F]).unwrap();
        flash.program(&[0xF1]).unwrap();

        let mut buf = [0u8; 1];
        flash.read(&mut buf).unwrap();
        assert_eq!(buf, [0x01]);

        flash.erase().unwrap();
        flash.read(&mut buf).unwrap();
        assert_eq!(buf, [0xFF]);
        assert_eq!(flash.erase_count(), 1);
        assert_eq!(flash.program_count(), 2);
    }

    #[test]
    fn test_ram_flash_rejects_oversized_access() {
        let mut flash = RamFlash::new(4);
        assert!(flash.program(&[0; 5]).is_err());
        assert!(flash.read(&mut [0; 5]).is_err());
    }

    #[test]
    fn test_file_flash_starts_erased() {
        let dir = tempdir().unwrap();
        let flash = FileFlash::open(dir.path().join("sector.bin"), 64).unwrap();

        let mut buf = [0u8; 64];
        flash.read(&mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == ERASED));
    }

    #[test]
    fn test_file_flash_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sector.bin");

        {
            let mut flash = FileFlash::open(&path, 64).unwrap();
            flash.erase().unwrap();
            flash.program(&[1, 2, 3]).unwrap();
        }

        let flash = FileFlash::open(&path, 64).unwrap();
        let mut buf = [0u8; 4];
        flash.read(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 0xFF]);
    }

    #[test]
    fn test_file_flash_reinitializes_wrong_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sector.bin");
        std::fs::write(&path, [0u8; 10]).unwrap();

        let flash = FileFlash::open(&path, 32).unwrap();
        let mut buf = [0u8; 32];
        flash.read(&mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == ERASED));
    }
}
