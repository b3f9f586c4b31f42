use crate::constants::{DATA_BUFFER_SIZE, STOR_QUOTA_MARGIN};
use crate::core_network::connection::{Connection, PassiveListener, TransferId};
use crate::core_transfer::listing::format_entry;
use crate::core_vfs::{DirEntry, FileHandle, FileSystem};
use crate::helpers::send_response;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    List,
    Retr,
    Stor,
}

/// Where LIST takes its entries from.
pub struct ListSource {
    pending: VecDeque<DirEntry>,
    dir: Option<Box<dyn FileHandle>>,
}

impl ListSource {
    /// Root listing: one synthetic entry per mount.
    pub fn entries(entries: Vec<DirEntry>) -> Self {
        Self {
            pending: entries.into(),
            dir: None,
        }
    }

    /// Listing of an opened path. A regular file lists itself.
    pub fn handle(handle: Box<dyn FileHandle>) -> Self {
        if handle.is_directory() {
            Self {
                pending: VecDeque::new(),
                dir: Some(handle),
            }
        } else {
            Self {
                pending: VecDeque::from([handle.entry()]),
                dir: None,
            }
        }
    }

    fn next_entry(&mut self) -> Option<DirEntry> {
        self.pending
            .pop_front()
            .or_else(|| self.dir.as_mut().and_then(|dir| dir.next_entry()))
    }
}

/// The command a passive transfer carries, with the resources it owns.
pub enum TransferCommand {
    List(ListSource),
    Retr(Box<dyn FileHandle>),
    Stor {
        file: Box<dyn FileHandle>,
        fs: Arc<dyn FileSystem>,
    },
}

impl TransferCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            TransferCommand::List(_) => CommandKind::List,
            TransferCommand::Retr(_) => CommandKind::Retr,
            TransferCommand::Stor { .. } => CommandKind::Stor,
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self {
            TransferCommand::List(source) => match source.dir.as_mut() {
                Some(dir) => dir.close(),
                None => Ok(()),
            },
            TransferCommand::Retr(file) => file.close(),
            TransferCommand::Stor { file, .. } => file.close(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Complete,
    StorageExhausted,
    LocalError,
}

/// One PASV invitation: a listener, at most one data connection and the
/// command executed over it.
pub struct PassiveTransfer {
    id: TransferId,
    listener: Option<Box<dyn PassiveListener>>,
    connection: Option<Box<dyn Connection>>,
    command: Option<TransferCommand>,
    kind: Option<CommandKind>,
    started: bool,
    closing: bool,
    buffer: Vec<u8>,
    offset: usize,
    size: usize,
    remaining_quota: u64,
    outcome: Outcome,
    transferred: u64,
}

impl PassiveTransfer {
    pub fn new(id: TransferId, listener: Box<dyn PassiveListener>) -> Self {
        Self {
            id,
            listener: Some(listener),
            connection: None,
            command: None,
            kind: None,
            started: false,
            closing: false,
            buffer: Vec::with_capacity(DATA_BUFFER_SIZE),
            offset: 0,
            size: 0,
            remaining_quota: 0,
            outcome: Outcome::Complete,
            transferred: 0,
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn has_command(&self) -> bool {
        self.kind.is_some()
    }

    /// Assigns the command once. Later calls are ignored and their resources
    /// dropped; the return value tells whether the command was taken.
    pub fn set_command(&mut self, command: TransferCommand, control: &mut dyn Connection) -> bool {
        if self.kind.is_some() {
            warn!(
                "Transfer {} already carries a {:?} command, ignoring {:?}",
                self.id,
                self.kind,
                command.kind()
            );
            return false;
        }

        if let TransferCommand::Stor { fs, .. } = &command {
            self.remaining_quota = fs.free_bytes();
            debug!(
                "Transfer {} may store up to {} bytes",
                self.id, self.remaining_quota
            );
        }

        self.kind = Some(command.kind());
        self.command = Some(command);
        self.try_start(control);
        true
    }

    /// A data connection arrived on the listener. Only the first one is kept.
    pub fn on_accept(&mut self, mut connection: Box<dyn Connection>, control: &mut dyn Connection) {
        if self.connection.is_some() || self.closing {
            warn!("Transfer {} rejects an extra data connection", self.id);
            connection.close();
            return;
        }

        if let Some(mut listener) = self.listener.take() {
            listener.close();
        }
        debug!("Transfer {} data connection established", self.id);
        self.connection = Some(connection);
        self.try_start(control);
    }

    pub fn on_ack(&mut self, _len: usize) {
        if self.started && !self.closing {
            self.pump();
        }
    }

    pub fn on_data(&mut self, data: &[u8]) {
        if self.closing {
            return;
        }
        let Some(TransferCommand::Stor { file, .. }) = self.command.as_mut() else {
            debug!("Transfer {} ignores {} inbound bytes", self.id, data.len());
            return;
        };

        let len = data.len() as u64;
        match self.remaining_quota.checked_sub(len) {
            Some(rest) if rest >= STOR_QUOTA_MARGIN => self.remaining_quota = rest,
            _ => {
                warn!(
                    "Transfer {} aborted: {} more bytes would exhaust storage",
                    self.id, len
                );
                self.abort_store(Outcome::StorageExhausted);
                return;
            }
        }

        if let Err(e) = file.write_all(data) {
            error!("Transfer {} failed to write {}: {}", self.id, file.path(), e);
            self.abort_store(Outcome::LocalError);
            return;
        }
        self.transferred += len;
    }

    /// The data connection is gone. Releases the file and reports the result
    /// on the control channel.
    pub fn on_disconnect(&mut self, control: &mut dyn Connection) {
        self.closing = true;
        self.connection = None;

        if let Some(mut command) = self.command.take() {
            if let Err(e) = command.close() {
                error!("Transfer {} failed to close its file: {}", self.id, e);
                self.outcome = Outcome::LocalError;
            }
        }

        let Some(kind) = self.kind else {
            debug!("Transfer {} closed before any command", self.id);
            return;
        };

        match self.outcome {
            Outcome::Complete => {
                info!(
                    "Transfer {} {:?} complete, {} bytes",
                    self.id, kind, self.transferred
                );
                send_response(control, "226 Transfer complete.");
            }
            Outcome::StorageExhausted => {
                send_response(control, "452 Insufficient storage space.");
            }
            Outcome::LocalError => {
                send_response(control, "451 Local error in processing.");
            }
        }
    }

    /// Releases the listener, the data connection and any open file.
    pub fn end(&mut self) {
        if let Some(mut listener) = self.listener.take() {
            listener.close();
        }
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        if let Some(mut command) = self.command.take() {
            if let Err(e) = command.close() {
                error!("Transfer {} failed to close its file: {}", self.id, e);
            }
        }
        self.closing = true;
    }

    fn try_start(&mut self, control: &mut dyn Connection) {
        if self.started || self.connection.is_none() {
            return;
        }
        let Some(kind) = self.kind else {
            return;
        };

        self.started = true;
        send_response(control, "150 Opening data connection.");
        if kind != CommandKind::Stor {
            self.pump();
        }
    }

    /// Sends the unsent part of the buffer, refilling it first once the
    /// previous chunk was fully accepted.
    fn pump(&mut self) {
        if self.offset == self.size {
            match self.refill() {
                Ok(0) => {
                    self.close_data();
                    return;
                }
                Ok(n) => {
                    self.offset = 0;
                    self.size = n;
                }
                Err(e) => {
                    error!("Transfer {} failed to read: {}", self.id, e);
                    self.outcome = Outcome::LocalError;
                    self.close_data();
                    return;
                }
            }
        }

        if let Some(connection) = self.connection.as_mut() {
            let sent = connection.write(&self.buffer[self.offset..self.size]);
            self.offset += sent;
            self.transferred += sent as u64;
        }
    }

    fn refill(&mut self) -> io::Result<usize> {
        match self.command.as_mut() {
            Some(TransferCommand::Retr(file)) => {
                self.buffer.resize(DATA_BUFFER_SIZE, 0);
                file.read(&mut self.buffer)
            }
            Some(TransferCommand::List(source)) => {
                self.buffer.clear();
                if let Some(entry) = source.next_entry() {
                    self.buffer.extend_from_slice(format_entry(&entry).as_bytes());
                }
                Ok(self.buffer.len())
            }
            _ => Ok(0),
        }
    }

    fn abort_store(&mut self, outcome: Outcome) {
        if let Some(TransferCommand::Stor { mut file, fs }) = self.command.take() {
            let path = file.path().to_string();
            if let Err(e) = file.close() {
                warn!("Failed to close partial upload {}: {}", path, e);
            }
            drop(file);
            if let Err(e) = fs.remove(&path) {
                error!("Failed to remove partial upload {}: {}", path, e);
            }
        }
        self.outcome = outcome;
        self.close_data();
    }

    fn close_data(&mut self) {
        self.closing = true;
        if let Some(connection) = self.connection.as_mut() {
            connection.close();
        }
    }
}

impl Drop for PassiveTransfer {
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_network::mock::{MockConnection, MockListener};
    use crate::core_vfs::{MemoryFs, OpenMode};

    fn transfer() -> (PassiveTransfer, MockListener) {
        let listener = MockListener::new(50000);
        (PassiveTransfer::new(1, Box::new(listener.clone())), listener)
    }

    /// Feeds acks until the transfer closes the data connection.
    fn drain(transfer: &mut PassiveTransfer, data: &MockConnection) {
        let mut rounds = 0;
        while !data.is_closed() {
            transfer.on_ack(0);
            rounds += 1;
            assert!(rounds < 10_000, "transfer never finished");
        }
    }

    #[test]
    fn test_retr_sends_whole_file_paced_by_acks() {
        let fs = MemoryFs::new(1 << 20);
        let content: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        fs.insert_file("/blob.bin", &content).unwrap();

        let (mut transfer, listener) = transfer();
        let control = MockConnection::new();
        let data = MockConnection::with_window(700);

        let file = fs.open("/blob.bin", OpenMode::Read).unwrap();
        assert!(transfer.set_command(TransferCommand::Retr(file), &mut control.clone()));
        assert_eq!(control.take_output(), "");

        transfer.on_accept(Box::new(data.clone()), &mut control.clone());
        assert!(listener.is_closed());
        assert_eq!(control.take_output(), "150 Opening data connection.\r\n");
        assert_eq!(data.output().len(), 700);

        drain(&mut transfer, &data);
        assert_eq!(data.output(), content);

        transfer.on_disconnect(&mut control.clone());
        assert_eq!(control.take_output(), "226 Transfer complete.\r\n");
    }

    #[test]
    fn test_retr_never_writes_more_than_one_buffer_per_ack() {
        let fs = MemoryFs::new(1 << 20);
        fs.insert_file("/blob.bin", &[7u8; DATA_BUFFER_SIZE * 3]).unwrap();

        let (mut transfer, _listener) = transfer();
        let control = MockConnection::new();
        let data = MockConnection::new();
        transfer.on_accept(Box::new(data.clone()), &mut control.clone());
        let file = fs.open("/blob.bin", OpenMode::Read).unwrap();
        transfer.set_command(TransferCommand::Retr(file), &mut control.clone());

        assert_eq!(data.write_sizes(), vec![DATA_BUFFER_SIZE]);
        transfer.on_ack(DATA_BUFFER_SIZE);
        assert_eq!(data.write_sizes(), vec![DATA_BUFFER_SIZE; 2]);
        transfer.on_ack(DATA_BUFFER_SIZE);
        transfer.on_ack(DATA_BUFFER_SIZE);
        assert!(data.is_closed());
        assert_eq!(data.output().len(), DATA_BUFFER_SIZE * 3);
    }

    #[test]
    fn test_list_emits_one_entry_per_ack() {
        let fs = MemoryFs::new(1 << 20);
        fs.insert_file("/logs/a.txt", b"aaa").unwrap();
        fs.insert_file("/logs/b.txt", b"bb").unwrap();

        let (mut transfer, _listener) = transfer();
        let control = MockConnection::new();
        let data = MockConnection::new();
        let dir = fs.open("/logs", OpenMode::Read).unwrap();
        transfer.set_command(TransferCommand::List(ListSource::handle(dir)), &mut control.clone());
        transfer.on_accept(Box::new(data.clone()), &mut control.clone());

        let first = data.take_output();
        assert!(first.ends_with(" a.txt\r\n"), "{first}");
        assert_eq!(first.lines().count(), 1);

        transfer.on_ack(first.len());
        assert!(data.take_output().ends_with(" b.txt\r\n"));
        assert!(!data.is_closed());

        transfer.on_ack(0);
        assert!(data.is_closed());
    }

    #[test]
    fn test_list_of_a_file_lists_the_file() {
        let fs = MemoryFs::new(1 << 20);
        fs.insert_file("/a.txt", b"abc").unwrap();
        let (mut transfer, _listener) = transfer();
        let control = MockConnection::new();
        let data = MockConnection::new();
        let file = fs.open("/a.txt", OpenMode::Read).unwrap();
        transfer.set_command(TransferCommand::List(ListSource::handle(file)), &mut control.clone());
        transfer.on_accept(Box::new(data.clone()), &mut control.clone());
        drain(&mut transfer, &data);
        let out = data.take_output();
        assert!(out.starts_with("-rw-r--r-- 1 user group        3 "), "{out}");
        assert!(out.ends_with(" a.txt\r\n"));
    }

    #[test]
    fn test_stor_writes_chunks_and_reports_success() {
        let fs = Arc::new(MemoryFs::new(1 << 20));
        let (mut transfer, _listener) = transfer();
        let control = MockConnection::new();
        let data = MockConnection::new();

        let file = fs.open("/upload.txt", OpenMode::Write).unwrap();
        transfer.set_command(
            TransferCommand::Stor {
                file,
                fs: fs.clone(),
            },
            &mut control.clone(),
        );
        transfer.on_accept(Box::new(data.clone()), &mut control.clone());
        assert_eq!(control.take_output(), "150 Opening data connection.\r\n");

        transfer.on_data(b"hello ");
        transfer.on_data(b"world");
        transfer.on_disconnect(&mut control.clone());

        assert_eq!(control.take_output(), "226 Transfer complete.\r\n");
        assert_eq!(fs.read_file("/upload.txt").unwrap(), b"hello world");
        assert_eq!(data.output(), b"");
    }

    #[test]
    fn test_stor_beyond_quota_removes_partial_file() {
        let fs = Arc::new(MemoryFs::new(STOR_QUOTA_MARGIN + 100));
        let (mut transfer, _listener) = transfer();
        let control = MockConnection::new();
        let data = MockConnection::new();

        let file = fs.open("/big.bin", OpenMode::Write).unwrap();
        transfer.set_command(
            TransferCommand::Stor {
                file,
                fs: fs.clone(),
            },
            &mut control.clone(),
        );
        transfer.on_accept(Box::new(data.clone()), &mut control.clone());
        control.take_output();

        transfer.on_data(&[1u8; 60]);
        assert!(fs.exists("/big.bin"));
        transfer.on_data(&[2u8; 60]);

        assert!(data.is_closed());
        assert!(!fs.exists("/big.bin"));

        // late chunks still in flight are dropped
        transfer.on_data(&[3u8; 10]);
        assert!(!fs.exists("/big.bin"));

        transfer.on_disconnect(&mut control.clone());
        assert_eq!(control.take_output(), "452 Insufficient storage space.\r\n");
    }

    #[test]
    fn test_second_command_is_ignored() {
        let fs = MemoryFs::new(1 << 20);
        fs.insert_file("/a", b"a").unwrap();
        let (mut transfer, _listener) = transfer();
        let control = MockConnection::new();

        let first = fs.open("/a", OpenMode::Read).unwrap();
        let second = fs.open("/", OpenMode::Read).unwrap();
        assert!(transfer.set_command(TransferCommand::Retr(first), &mut control.clone()));
        assert!(!transfer.set_command(
            TransferCommand::List(ListSource::handle(second)),
            &mut control.clone()
        ));

        let data = MockConnection::new();
        transfer.on_accept(Box::new(data.clone()), &mut control.clone());
        drain(&mut transfer, &data);
        assert_eq!(data.output(), b"a");
    }

    #[test]
    fn test_extra_data_connection_is_rejected() {
        let (mut transfer, _listener) = transfer();
        let control = MockConnection::new();
        let first = MockConnection::new();
        let second = MockConnection::new();
        transfer.on_accept(Box::new(first.clone()), &mut control.clone());
        transfer.on_accept(Box::new(second.clone()), &mut control.clone());
        assert!(!first.is_closed());
        assert!(second.is_closed());
    }

    #[test]
    fn test_disconnect_without_command_is_silent() {
        let (mut transfer, _listener) = transfer();
        let control = MockConnection::new();
        transfer.on_accept(Box::new(MockConnection::new()), &mut control.clone());
        transfer.on_disconnect(&mut control.clone());
        assert_eq!(control.take_output(), "");
    }

    #[test]
    fn test_end_releases_listener_and_connection() {
        let (mut transfer, listener) = transfer();
        let control = MockConnection::new();
        let data = MockConnection::new();
        transfer.on_accept(Box::new(data.clone()), &mut control.clone());
        drop(transfer);
        assert!(listener.is_closed());
        assert!(data.is_closed());

        let (transfer, listener) = self::transfer();
        drop(transfer);
        assert!(listener.is_closed());
    }
}
