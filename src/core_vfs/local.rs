// Storage backend rooted in a directory of the host filesystem.

use crate::core_vfs::{DirEntry, FileHandle, FileSystem, OpenMode};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fs::{self, File, Metadata, OpenOptions, ReadDir};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use sysinfo::{DiskExt, System, SystemExt};

#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    capacity: Option<u64>,
}

impl LocalFs {
    /// `capacity` caps the space the mount may use; without it the free
    /// space of the disk holding `root` is reported.
    pub fn new<P: AsRef<Path>>(root: P, capacity: Option<u64>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            capacity,
        }
    }

    /// Checks that the root directory is usable, creating it when asked to.
    pub fn init(&self, create: bool) -> io::Result<()> {
        if create {
            fs::create_dir_all(&self.root)?;
        }
        let metadata = fs::metadata(&self.root)?;
        if !metadata.is_dir() {
            return Err(io::Error::other(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    fn host_path(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    /// Disk (total, available) bytes for the disk holding the root.
    fn disk_space(&self) -> Option<(u64, u64)> {
        let root = self.root.canonicalize().ok()?;
        let mut sys = System::new();
        sys.refresh_disks_list();
        sys.refresh_disks();

        sys.disks()
            .iter()
            .filter(|disk| root.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| (disk.total_space(), disk.available_space()))
    }
}

fn modified_of(metadata: &Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

/// Bytes used by regular files below `dir`, unreadable entries ignored.
fn directory_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| match entry.metadata() {
            Ok(metadata) if metadata.is_dir() => directory_size(&entry.path()),
            Ok(metadata) => metadata.len(),
            Err(_) => 0,
        })
        .sum()
}

impl FileSystem for LocalFs {
    fn exists(&self, path: &str) -> bool {
        self.host_path(path).exists()
    }

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn FileHandle>> {
        let host = self.host_path(path);
        debug!("Opening {:?} ({:?})", host, mode);

        match mode {
            OpenMode::Read => {
                let metadata = fs::metadata(&host)?;
                if metadata.is_dir() {
                    Ok(Box::new(LocalDir {
                        path: path.to_string(),
                        entries: fs::read_dir(&host)?,
                        modified: modified_of(&metadata),
                    }))
                } else {
                    Ok(Box::new(LocalFile {
                        path: path.to_string(),
                        file: File::open(&host)?,
                        size: metadata.len(),
                        modified: modified_of(&metadata),
                    }))
                }
            }
            OpenMode::Write => {
                let file = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&host)?;
                Ok(Box::new(LocalFile {
                    path: path.to_string(),
                    file,
                    size: 0,
                    modified: Some(Utc::now()),
                }))
            }
        }
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        fs::remove_file(self.host_path(path))
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(self.host_path(from), self.host_path(to))
    }

    fn mkdir(&self, path: &str) -> io::Result<()> {
        fs::create_dir(self.host_path(path))
    }

    fn rmdir(&self, path: &str) -> io::Result<()> {
        fs::remove_dir(self.host_path(path))
    }

    fn free_bytes(&self) -> u64 {
        match self.capacity {
            Some(capacity) => capacity.saturating_sub(directory_size(&self.root)),
            None => self.disk_space().map(|(_, free)| free).unwrap_or_else(|| {
                warn!("No disk found containing {:?}", self.root);
                0
            }),
        }
    }

    fn total_bytes(&self) -> u64 {
        match self.capacity {
            Some(capacity) => capacity,
            None => self.disk_space().map(|(total, _)| total).unwrap_or(0),
        }
    }
}

struct LocalFile {
    path: String,
    file: File,
    size: u64,
    modified: Option<DateTime<Utc>>,
}

impl FileHandle for LocalFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_directory(&self) -> bool {
        false
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.size += data.len() as u64;
        Ok(())
    }

    fn next_entry(&mut self) -> Option<DirEntry> {
        None
    }

    fn close(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

struct LocalDir {
    path: String,
    entries: ReadDir,
    modified: Option<DateTime<Utc>>,
}

impl FileHandle for LocalDir {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_directory(&self) -> bool {
        true
    }

    fn size(&self) -> u64 {
        0
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other(format!("{} is a directory", self.path)))
    }

    fn write_all(&mut self, _data: &[u8]) -> io::Result<()> {
        Err(io::Error::other(format!("{} is a directory", self.path)))
    }

    fn next_entry(&mut self) -> Option<DirEntry> {
        for entry in self.entries.by_ref().flatten() {
            let Ok(metadata) = entry.metadata() else {
                warn!("Failed to get metadata for entry: {:?}", entry.path());
                continue;
            };
            return Some(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
                modified: modified_of(&metadata),
            });
        }
        None
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
