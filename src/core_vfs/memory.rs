// In-memory storage backend, used for RAM-disk mounts and by the tests.

use crate::core_vfs::{DirEntry, FileHandle, FileSystem, OpenMode};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Node {
    Dir { modified: DateTime<Utc> },
    File { data: Vec<u8>, modified: DateTime<Utc> },
}

#[derive(Debug, Default)]
struct MemoryTree {
    nodes: BTreeMap<String, Node>,
}

impl MemoryTree {
    fn is_dir(&self, path: &str) -> bool {
        path == "/" || matches!(self.nodes.get(path), Some(Node::Dir { .. }))
    }

    fn used_bytes(&self) -> u64 {
        self.nodes
            .values()
            .map(|node| match node {
                Node::File { data, .. } => data.len() as u64,
                Node::Dir { .. } => 0,
            })
            .sum()
    }

    /// Keys strictly below `path`, at any depth.
    fn descendants(&self, path: &str) -> Vec<String> {
        let prefix = child_prefix(path);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn children(&self, path: &str) -> VecDeque<DirEntry> {
        let prefix = child_prefix(path);
        self.nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(key, node)| entry_for(&key[prefix.len()..], node))
            .collect()
    }
}

fn child_prefix(path: &str) -> String {
    if path == "/" {
        "/".to_string()
    } else {
        format!("{}/", path)
    }
}

fn entry_for(name: &str, node: &Node) -> DirEntry {
    match node {
        Node::Dir { modified } => DirEntry {
            name: name.to_string(),
            is_dir: true,
            size: 0,
            modified: Some(*modified),
        },
        Node::File { data, modified } => DirEntry {
            name: name.to_string(),
            is_dir: false,
            size: data.len() as u64,
            modified: Some(*modified),
        },
    }
}

fn key(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{}", trimmed)
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path))
}

fn already_exists(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::AlreadyExists, format!("{} already exists", path))
}

/// A bounded in-memory directory tree.
#[derive(Debug, Clone)]
pub struct MemoryFs {
    tree: Arc<Mutex<MemoryTree>>,
    capacity: u64,
}

impl MemoryFs {
    pub fn new(capacity: u64) -> Self {
        Self {
            tree: Arc::new(Mutex::new(MemoryTree::default())),
            capacity,
        }
    }

    /// Creates or replaces a file in one step, creating missing parents.
    #[cfg(test)]
    pub fn insert_file(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let path = key(path);
        let mut tree = self.tree.lock();
        let mut dir = parent(&path).to_string();
        let mut missing = Vec::new();
        while dir != "/" && !tree.nodes.contains_key(&dir) {
            missing.push(dir.clone());
            dir = parent(&dir).to_string();
        }
        if !tree.is_dir(&dir) {
            return Err(not_found(&dir));
        }
        let now = Utc::now();
        for dir in missing {
            tree.nodes.insert(dir, Node::Dir { modified: now });
        }
        tree.nodes.insert(
            path,
            Node::File {
                data: data.to_vec(),
                modified: now,
            },
        );
        Ok(())
    }

    /// Content of a regular file, if there is one at `path`.
    #[cfg(test)]
    pub fn read_file(&self, path: &str) -> Option<Vec<u8>> {
        match self.tree.lock().nodes.get(&key(path)) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }
}

impl FileSystem for MemoryFs {
    fn exists(&self, path: &str) -> bool {
        let path = key(path);
        path == "/" || self.tree.lock().nodes.contains_key(&path)
    }

    fn open(&self, path: &str, mode: OpenMode) -> io::Result<Box<dyn FileHandle>> {
        let path = key(path);
        let mut tree = self.tree.lock();

        match mode {
            OpenMode::Read => {
                if path == "/" {
                    return Ok(Box::new(MemoryDir {
                        entries: tree.children(&path),
                        path,
                        modified: None,
                    }));
                }
                match tree.nodes.get(&path) {
                    Some(Node::Dir { modified }) => Ok(Box::new(MemoryDir {
                        entries: tree.children(&path),
                        modified: Some(*modified),
                        path,
                    })),
                    Some(Node::File { data, modified }) => Ok(Box::new(MemoryReader {
                        data: data.clone(),
                        position: 0,
                        modified: *modified,
                        path,
                    })),
                    None => Err(not_found(&path)),
                }
            }
            OpenMode::Write => {
                if path == "/" || tree.is_dir(&path) {
                    return Err(io::Error::other(format!("{} is a directory", path)));
                }
                if !tree.is_dir(parent(&path)) {
                    return Err(not_found(parent(&path)));
                }
                tree.nodes.insert(
                    path.clone(),
                    Node::File {
                        data: Vec::new(),
                        modified: Utc::now(),
                    },
                );
                Ok(Box::new(MemoryWriter {
                    tree: Arc::clone(&self.tree),
                    capacity: self.capacity,
                    written: 0,
                    path,
                }))
            }
        }
    }

    fn remove(&self, path: &str) -> io::Result<()> {
        let path = key(path);
        let mut tree = self.tree.lock();
        match tree.nodes.get(&path) {
            Some(Node::File { .. }) => {
                tree.nodes.remove(&path);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(io::Error::other(format!("{} is a directory", path))),
            None => Err(not_found(&path)),
        }
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let (from, to) = (key(from), key(to));
        let mut tree = self.tree.lock();

        if from == "/" || !tree.nodes.contains_key(&from) {
            return Err(not_found(&from));
        }
        if to == "/" || tree.nodes.contains_key(&to) {
            return Err(already_exists(&to));
        }
        if !tree.is_dir(parent(&to)) {
            return Err(not_found(parent(&to)));
        }
        if to.starts_with(&child_prefix(&from)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot move a directory into itself",
            ));
        }

        let moved = tree.descendants(&from);
        if let Some(node) = tree.nodes.remove(&from) {
            tree.nodes.insert(to.clone(), node);
        }
        for old in moved {
            if let Some(node) = tree.nodes.remove(&old) {
                let new = format!("{}{}", to, &old[from.len()..]);
                tree.nodes.insert(new, node);
            }
        }
        Ok(())
    }

    fn mkdir(&self, path: &str) -> io::Result<()> {
        let path = key(path);
        let mut tree = self.tree.lock();
        if path == "/" || tree.nodes.contains_key(&path) {
            return Err(already_exists(&path));
        }
        if !tree.is_dir(parent(&path)) {
            return Err(not_found(parent(&path)));
        }
        tree.nodes.insert(path, Node::Dir { modified: Utc::now() });
        Ok(())
    }

    fn rmdir(&self, path: &str) -> io::Result<()> {
        let path = key(path);
        let mut tree = self.tree.lock();
        match tree.nodes.get(&path) {
            Some(Node::Dir { .. }) => {
                if !tree.descendants(&path).is_empty() {
                    return Err(io::Error::other(format!("{} is not empty", path)));
                }
                tree.nodes.remove(&path);
                Ok(())
            }
            Some(Node::File { .. }) => Err(io::Error::other(format!("{} is not a directory", path))),
            None => Err(not_found(&path)),
        }
    }

    fn free_bytes(&self) -> u64 {
        self.capacity.saturating_sub(self.tree.lock().used_bytes())
    }

    fn total_bytes(&self) -> u64 {
        self.capacity
    }
}

struct MemoryReader {
    path: String,
    data: Vec<u8>,
    position: usize,
    modified: DateTime<Utc>,
}

impl FileHandle for MemoryReader {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_directory(&self) -> bool {
        false
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        Some(self.modified)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }

    fn write_all(&mut self, _data: &[u8]) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "file opened for reading",
        ))
    }

    fn next_entry(&mut self) -> Option<DirEntry> {
        None
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MemoryWriter {
    tree: Arc<Mutex<MemoryTree>>,
    path: String,
    capacity: u64,
    written: u64,
}

impl FileHandle for MemoryWriter {
    fn path(&self) -> &str {
        &self.path
    }

    fn is_directory(&self) -> bool {
        false
    }

    fn size(&self) -> u64 {
        self.written
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        match self.tree.lock().nodes.get(&self.path) {
            Some(Node::File { modified, .. }) => Some(*modified),
            _ => None,
        }
    }

    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "file opened for writing",
        ))
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut tree = self.tree.lock();
        if tree.used_bytes() + data.len() as u64 > self.capacity {
            return Err(io::Error::other("no space left on memory filesystem"));
        }
        match tree.nodes.get_mut(&self.path) {
            Some(Node::File { data: content, modified }) => {
                content.extend_from_slice(data);
                *modified = Utc::now();
                self.written += data.len() as u64;
                Ok(())
            }
            _ => Err(not_found(&self.path)),
        }
    }

    fn next_entry(&mut self) -> Option<DirEntry> {
        None
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct MemoryDir {
    path: String,
    entries: VecDeque<DirEntry>,
    modified: Option<DateTime<Utc>>,
}

impl FileHandle for MemoryDir {
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
        self.entries.pop_front()
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}
