//! Non-volatile image backends.

use std::cell::{Cell, RefCell};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use kettle_traits::NvStore;
use tracing::{debug, warn};

use crate::error::{HwError, Result};

/// Erased EEPROM cells read back as 0xFF.
pub const ERASED: u8 = 0xFF;

fn check_range(addr: usize, len: usize, size: usize) -> Result<()> {
    match addr.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(HwError::OutOfRange { addr, len, size }),
    }
}

/// In-memory EEPROM image. Clones share the image and the commit counter.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    image: Rc<RefCell<Vec<u8>>>,
    commits: Rc<Cell<usize>>,
}

impl MemoryStore {
    pub fn new(size: usize) -> Self {
        Self {
            image: Rc::new(RefCell::new(vec![ERASED; size])),
            commits: Rc::new(Cell::new(0)),
        }
    }

    /// Build from an existing image, e.g. a record persisted by a previous run.
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            image: Rc::new(RefCell::new(image)),
            commits: Rc::new(Cell::new(0)),
        }
    }

    pub fn image(&self) -> Vec<u8> {
        self.image.borrow().clone()
    }

    pub fn commits(&self) -> usize {
        self.commits.get()
    }
}

impl NvStore for MemoryStore {
    fn read(
        &mut self,
        addr: usize,
        buf: &mut [u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let image = self.image.borrow();
        check_range(addr, buf.len(), image.len())?;
        buf.copy_from_slice(&image[addr..addr + buf.len()]);
        Ok(())
    }

    fn write(
        &mut self,
        addr: usize,
        bytes: &[u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut image = self.image.borrow_mut();
        check_range(addr, bytes.len(), image.len())?;
        image[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.commits.set(self.commits.get() + 1);
        Ok(())
    }
}

/// EEPROM image kept in a file; `commit` replaces the file atomically.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    image: Vec<u8>,
}

impl FileStore {
    /// Open `path`, or start from an erased image when it does not exist yet.
    /// A file of the wrong length is padded or truncated to `size`.
    pub fn open(path: impl AsRef<Path>, size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut image = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no store image yet; starting erased");
                Vec::new()
            }
            Err(e) => return Err(HwError::Io(e)),
        };
        if !image.is_empty() && image.len() != size {
            warn!(
                path = %path.display(),
                found = image.len(),
                expected = size,
                "store image has unexpected length; resizing"
            );
        }
        image.resize(size, ERASED);
        Ok(Self { path, image })
    }

    /// The image on disk is either the previous commit or this one.
    fn flush_image(&self) -> std::io::Result<()> {
        let staged = self.path.with_extension("img.staged");
        let mut f = fs::File::create(&staged)?;
        f.write_all(&self.image)?;
        f.sync_all()?;
        drop(f);
        fs::rename(&staged, &self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl NvStore for FileStore {
    fn read(
        &mut self,
        addr: usize,
        buf: &mut [u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        check_range(addr, buf.len(), self.image.len())?;
        buf.copy_from_slice(&self.image[addr..addr + buf.len()]);
        Ok(())
    }

    fn write(
        &mut self,
        addr: usize,
        bytes: &[u8],
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        check_range(addr, bytes.len(), self.image.len())?;
        self.image[addr..addr + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.flush_image().map_err(HwError::Io)?;
        debug!(path = %self.path.display(), "store image committed");
        Ok(())
    }
}
