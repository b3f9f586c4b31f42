// Virtual filesystem: the namespace FTP clients see, the mounts behind it
// and the storage backends those mounts point to.

pub mod error;
pub mod local;
pub mod memory;
pub mod mount;
pub mod path;

pub use error::PathError;
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use mount::{Mount, MountTable, Resolved};
pub use path::{normalize, VirtualPath};

use chrono::{DateTime, Utc};
use std::io;

/// How a file is opened on a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Creates the file, truncating any previous content.
    Write,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// An open file or directory on a backend. Dropping the handle releases it;
/// `close` additionally reports flush errors.
pub trait FileHandle: Send {
    /// Path of the handle relative to its filesystem root.
    fn path(&self) -> &str;
    fn is_directory(&self) -> bool;
    fn size(&self) -> u64;
    fn modified(&self) -> Option<DateTime<Utc>>;

    /// Reads the next chunk of a regular file. `Ok(0)` means end of file.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Next unread entry of a directory handle, `None` once exhausted or
    /// when the handle is not a directory.
    fn next_entry(&mut self) -> Option<DirEntry>;

    fn close(&mut self) -> io::Result<()>;

    /// Describes the handle itself as a listing entry.
    fn entry(&self) -> DirEntry {
        let name = self
            .path()
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("/")
            .to_string();
        DirEntry {
            name,
            is_dir: self.is_directory(),
            size: self.size(),
            modified: self.modified(),
        }
    }
}

/// A storage backend that can be mounted into the virtual namespace.
///
/// Paths are absolute within the backend (`/`, `/logs`, `/logs/a.txt`) and
/// are always produced by the path resolver, so they never contain `.` or
/// `..` segments.
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &str) -> bool;
    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn FileHandle>>;
    fn remove(&self, path: &str) -> io::Result<()>;
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
    fn mkdir(&self, path: &str) -> io::Result<()>;
    fn rmdir(&self, path: &str) -> io::Result<()>;
    fn free_bytes(&self) -> u64;
    fn total_bytes(&self) -> u64;
}
