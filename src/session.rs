use crate::config::ServerConfig;
use crate::core_ftpcommand::framer::CommandBuffer;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::handlers::{initialize_command_handlers, CommandHandler};
use crate::core_ftpcommand::{pass, user};
use crate::core_network::connection::{Connection, DataTransport, SessionEvent, TransferId};
use crate::core_transfer::passive::PassiveTransfer;
use crate::core_vfs::{MountTable, PathError, Resolved, VirtualPath};
use crate::helpers::send_response;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// State shared by every session of a server.
#[derive(Debug)]
pub struct ServerContext {
    pub config: ServerConfig,
    pub mounts: MountTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    AwaitingUser,
    /// The configured user name was accepted, PASS is expected next.
    AwaitingPassword,
    LoggedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Ebcdic,
    Image,
    Local,
}

/// One control connection and everything hanging off it.
pub struct Session {
    pub(crate) control: Box<dyn Connection>,
    pub(crate) context: Arc<ServerContext>,
    pub(crate) transport: Box<dyn DataTransport>,
    pub(crate) auth: AuthState,
    pub(crate) cwd: VirtualPath,
    pub(crate) transfer_type: TransferType,
    pub(crate) utf8: bool,
    pub(crate) rename_from: Option<VirtualPath>,
    pub(crate) transfer: Option<PassiveTransfer>,
    pub(crate) local_ip: Ipv4Addr,
    pub(crate) login_failures: u32,
    commands: CommandBuffer,
    handlers: HashMap<FtpCommand, CommandHandler>,
    next_transfer: TransferId,
    closed: bool,
}

impl Session {
    /// Creates the session and greets the client.
    pub fn new(
        control: Box<dyn Connection>,
        context: Arc<ServerContext>,
        transport: Box<dyn DataTransport>,
        local_ip: Ipv4Addr,
    ) -> Self {
        let mut session = Self {
            control,
            context,
            transport,
            auth: AuthState::AwaitingUser,
            cwd: VirtualPath::root(),
            transfer_type: TransferType::Ascii,
            utf8: false,
            rename_from: None,
            transfer: None,
            local_ip,
            login_failures: 0,
            commands: CommandBuffer::new(),
            handlers: initialize_command_handlers(),
            next_transfer: 0,
            closed: false,
        };
        let greeting = format!("220 {}", session.context.config.greeting);
        session.reply(&greeting);
        session
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    #[cfg(test)]
    pub(crate) fn cwd(&self) -> &VirtualPath {
        &self.cwd
    }

    pub(crate) fn reply(&mut self, message: &str) {
        send_response(self.control.as_mut(), message);
    }

    pub(crate) fn resolve(&self, path: &VirtualPath) -> Result<Resolved, PathError> {
        self.context.mounts.resolve(path)
    }

    pub(crate) fn allocate_transfer_id(&mut self) -> TransferId {
        self.next_transfer += 1;
        self.next_transfer
    }

    /// Processes one notification from the transport.
    pub fn handle_event(&mut self, event: SessionEvent) {
        if self.closed {
            debug!("Dropping {:?} for a closed session", event);
            return;
        }

        match event {
            SessionEvent::ControlData(data) => self.on_control_data(&data),
            SessionEvent::ControlClosed => {
                info!("Client disconnected");
                self.close();
            }
            SessionEvent::ControlTimeout => {
                // the control channel stays silent while data flows
                if self.transfer.as_ref().is_some_and(|t| t.has_command()) {
                    debug!("Control connection idle during a transfer");
                    return;
                }
                warn!("Control connection idle for too long");
                self.reply("421 Timeout.");
                self.close();
            }
            SessionEvent::DataAccepted {
                transfer,
                mut connection,
            } => match self.transfer.as_mut().filter(|t| t.id() == transfer) {
                Some(active) => active.on_accept(connection, self.control.as_mut()),
                None => {
                    debug!("Refusing data connection for stale transfer {}", transfer);
                    connection.close();
                }
            },
            SessionEvent::DataReceived { transfer, data } => {
                if let Some(active) = self.transfer.as_mut().filter(|t| t.id() == transfer) {
                    active.on_data(&data);
                }
            }
            SessionEvent::DataAcked { transfer, len } => {
                if let Some(active) = self.transfer.as_mut().filter(|t| t.id() == transfer) {
                    active.on_ack(len);
                }
            }
            SessionEvent::DataClosed { transfer } => {
                if let Some(active) = self.transfer.as_mut().filter(|t| t.id() == transfer) {
                    active.on_disconnect(self.control.as_mut());
                    self.transfer = None;
                }
            }
        }
    }

    fn on_control_data(&mut self, data: &[u8]) {
        self.commands.feed(data);

        while !self.closed && self.commands.has_line() {
            self.dispatch();
            self.commands.next_line();
        }

        if !self.closed && self.commands.over_limit() {
            warn!("Discarding an unterminated command line");
            self.commands.clear();
            self.reply("500 Command line too long.");
        }
    }

    fn dispatch(&mut self) {
        let verb = self.commands.get_word();
        let arg = self.commands.get_rest();
        let command = FtpCommand::from_str(&verb);

        if command == Some(FtpCommand::PASS) {
            debug!("Received command: PASS ****");
        } else {
            debug!("Received command: {} {}", verb, arg);
        }

        if self.auth != AuthState::LoggedIn {
            match command {
                Some(FtpCommand::USER) => user::handle_user_command(self, arg),
                Some(FtpCommand::PASS) => pass::handle_pass_command(self, arg),
                _ => self.reply("530 Not logged in."),
            }
            return;
        }

        match command.and_then(|c| self.handlers.get(&c).copied()) {
            Some(handler) => handler(self, arg),
            None => {
                debug!("Command not implemented: {}", verb);
                self.reply("502 Command not implemented.");
            }
        }
    }

    /// Tears down the active transfer and closes the control connection.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut transfer) = self.transfer.take() {
            transfer.end();
        }
        self.control.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub peer: SocketAddr,
    pub connected_at: DateTime<Local>,
}

/// Live control connections, bounded by `max_sessions`.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<u64, SessionInfo>>>,
    next_id: Arc<Mutex<u64>>,
    max_sessions: usize,
}

/// Keeps a session registered for as long as it lives.
#[derive(Debug)]
pub struct SessionGuard {
    id: u64,
    sessions: Arc<Mutex<HashMap<u64, SessionInfo>>>,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::default(),
            next_id: Arc::default(),
            max_sessions,
        }
    }

    /// Registers a new connection, or returns `None` when the server is full.
    pub fn try_register(&self, peer: SocketAddr) -> Option<SessionGuard> {
        let mut sessions = self.sessions.lock();
        if sessions.len() >= self.max_sessions {
            return None;
        }

        let id = {
            let mut next_id = self.next_id.lock();
            *next_id += 1;
            *next_id
        };
        sessions.insert(
            id,
            SessionInfo {
                peer,
                connected_at: Local::now(),
            },
        );
        Some(SessionGuard {
            id,
            sessions: Arc::clone(&self.sessions),
        })
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl SessionGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(info) = self.sessions.lock().remove(&self.id) {
            let duration = Local::now() - info.connected_at;
            info!(
                "Session {} from {} ended after {}s",
                self.id,
                info.peer,
                duration.num_seconds()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::constants::{DATA_BUFFER_SIZE, STOR_QUOTA_MARGIN};
    use crate::core_network::mock::{MockConnection, MockTransport};
    use crate::core_vfs::{FileSystem, MemoryFs};

    struct Harness {
        session: Session,
        control: MockConnection,
        transport: MockTransport,
        little: Arc<MemoryFs>,
        sd: Arc<MemoryFs>,
    }

    fn harness_with(little_capacity: u64, max_login_failures: u32) -> Harness {
        let mut config = parse_config(
            r#"
            [server]
            username = "admin"
            password = "esp32"
            pasv_port_min = 50000
            pasv_port_max = 50000
            "#,
        )
        .unwrap();
        config.server.max_login_failures = max_login_failures;

        let little = Arc::new(MemoryFs::new(little_capacity));
        let sd = Arc::new(MemoryFs::new(1 << 20));
        let mut mounts = MountTable::new();
        mounts.mount("/LittleFS", little.clone(), true);
        mounts.mount("/SD", sd.clone(), true);

        let context = Arc::new(ServerContext {
            config: config.server,
            mounts,
        });
        let control = MockConnection::new();
        let transport = MockTransport::new();
        let session = Session::new(
            Box::new(control.clone()),
            context,
            Box::new(transport.clone()),
            Ipv4Addr::new(127, 0, 0, 1),
        );
        Harness {
            session,
            control,
            transport,
            little,
            sd,
        }
    }

    fn harness() -> Harness {
        harness_with(1 << 20, 5)
    }

    impl Harness {
        fn send(&mut self, line: &str) -> String {
            self.session
                .handle_event(SessionEvent::ControlData(format!("{line}\r\n").into_bytes()));
            self.control.take_output()
        }

        fn login(&mut self) {
            self.control.take_output();
            assert_eq!(self.send("USER admin"), "331 User name okay, need password.\r\n");
            assert_eq!(self.send("PASS esp32"), "230 User logged in, proceed.\r\n");
        }

        /// Opens a passive transfer and returns its id.
        fn pasv(&mut self) -> TransferId {
            let reply = self.send("PASV");
            assert_eq!(reply, "227 Entering Passive Mode (127,0,0,1,195,80).\r\n");
            self.transport.listeners().last().unwrap().0
        }

        fn connect_data(&mut self, transfer: TransferId) -> MockConnection {
            let data = MockConnection::new();
            self.session.handle_event(SessionEvent::DataAccepted {
                transfer,
                connection: Box::new(data.clone()),
            });
            data
        }

        /// Acks until the server closes the data connection, then reports
        /// the close back.
        fn finish(&mut self, transfer: TransferId, data: &MockConnection) -> String {
            let mut rounds = 0;
            while !data.is_closed() {
                self.session.handle_event(SessionEvent::DataAcked {
                    transfer,
                    len: DATA_BUFFER_SIZE,
                });
                rounds += 1;
                assert!(rounds < 10_000);
            }
            self.session
                .handle_event(SessionEvent::DataClosed { transfer });
            self.control.take_output()
        }
    }

    #[test]
    fn test_greeting_on_connect() {
        let h = harness();
        assert_eq!(h.control.take_output(), "220 Service ready for new user.\r\n");
    }

    #[test]
    fn test_pass_before_user_is_rejected() {
        let mut h = harness();
        h.control.take_output();
        assert_eq!(h.send("PASS esp32"), "530 Not logged in.\r\n");
        assert_ne!(h.session.auth, AuthState::LoggedIn);
    }

    #[test]
    fn test_user_replies() {
        let mut h = harness();
        h.control.take_output();
        assert_eq!(h.send("USER"), "501 Syntax error in parameters or arguments.\r\n");
        assert_eq!(h.send("USER anonymous"), "332 Need account for login.\r\n");
        assert_eq!(h.send("USER root"), "530 Not logged in.\r\n");
        assert_eq!(h.send("PASS esp32"), "530 Not logged in.\r\n");
        assert_ne!(h.session.auth, AuthState::LoggedIn);
    }

    #[test]
    fn test_wrong_password_then_correct_login() {
        let mut h = harness();
        h.control.take_output();
        h.send("USER admin");
        assert_eq!(h.send("PASS wrong"), "530 Not logged in.\r\n");
        assert_ne!(h.session.auth, AuthState::LoggedIn);
        assert_eq!(h.send("PASS"), "501 Syntax error in parameters or arguments.\r\n");

        h.send("user admin");
        assert_eq!(h.send("pass esp32"), "230 User logged in, proceed.\r\n");
        assert_eq!(h.session.auth, AuthState::LoggedIn);
    }

    #[test]
    fn test_unauthenticated_commands_go_to_the_authenticator() {
        let mut h = harness();
        h.control.take_output();
        for line in ["PWD", "CWD /LittleFS", "LIST", "QUIT", "BOGUS"] {
            assert_eq!(h.send(line), "530 Not logged in.\r\n", "{line}");
        }
        assert!(!h.session.is_closed());
    }

    #[test]
    fn test_repeated_login_failures_close_the_connection() {
        let mut h = harness_with(1 << 20, 2);
        h.control.take_output();
        h.send("USER admin");
        assert_eq!(h.send("PASS a"), "530 Not logged in.\r\n");
        assert_eq!(
            h.send("PASS b"),
            "421 Too many login failures, closing control connection.\r\n"
        );
        assert!(h.session.is_closed());
        assert!(h.control.is_closed());
    }

    #[test]
    fn test_cwd_pwd_and_cdup() {
        let mut h = harness();
        h.little.insert_file("/logs/today.txt", b"x").unwrap();
        h.login();

        assert_eq!(h.send("PWD"), "257 \"/\" is current directory.\r\n");
        assert_eq!(h.send("CWD /LittleFS/logs"), "250 Working directory changed.\r\n");
        assert_eq!(h.session.cwd().as_str(), "/LittleFS/logs/");
        assert_eq!(h.send("PWD"), "257 \"/LittleFS/logs/\" is current directory.\r\n");

        assert_eq!(h.send("CWD /LittleFS/missing"), "550 Directory not found.\r\n");
        assert_eq!(h.send("CWD today.txt"), "550 Directory not found.\r\n");
        assert_eq!(h.session.cwd().as_str(), "/LittleFS/logs/");

        assert_eq!(h.send("CDUP"), "200 Working directory changed.\r\n");
        assert_eq!(h.session.cwd().as_str(), "/LittleFS/");
        assert_eq!(h.send("CWD ../../.."), "250 Working directory changed.\r\n");
        assert_eq!(h.session.cwd().as_str(), "/");
        assert_eq!(h.send("CWD"), "501 Syntax error in parameters or arguments.\r\n");
        assert_eq!(h.send("CWD /Nowhere"), "550 Directory not found.\r\n");
    }

    #[test]
    fn test_stor_without_pasv_is_bad_sequence() {
        let mut h = harness();
        h.login();
        h.send("CWD /LittleFS/");
        assert_eq!(h.send("STOR report.txt"), "503 Bad sequence of commands.\r\n");
        assert!(!h.little.exists("/report.txt"));
        assert_eq!(h.send("RETR report.txt"), "503 Bad sequence of commands.\r\n");
        assert_eq!(h.send("LIST"), "503 Bad sequence of commands.\r\n");
    }

    #[test]
    fn test_pasv_twice_tears_down_the_first_transfer() {
        let mut h = harness();
        h.login();
        let first = h.pasv();
        let second = h.pasv();
        assert_ne!(first, second);

        let listeners = h.transport.listeners();
        assert_eq!(listeners.len(), 2);
        assert!(listeners[0].1.is_closed());
        assert!(!listeners[1].1.is_closed());

        // a late connection to the first listener is refused
        let stale = h.connect_data(first);
        assert!(stale.is_closed());
    }

    #[test]
    fn test_pasv_bind_failure() {
        let mut h = harness();
        h.login();
        h.transport.refuse_binds();
        assert_eq!(h.send("PASV"), "425 Can't open data connection.\r\n");
        assert!(h.session.transfer.is_none());
    }

    #[test]
    fn test_retr_streams_whole_file() {
        let mut h = harness();
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 253) as u8).collect();
        h.little.insert_file("/fw.bin", &content).unwrap();
        h.login();

        let id = h.pasv();
        assert_eq!(h.send("RETR /LittleFS/fw.bin"), "");
        let data = h.connect_data(id);
        assert_eq!(h.control.take_output(), "150 Opening data connection.\r\n");
        assert_eq!(h.finish(id, &data), "226 Transfer complete.\r\n");
        assert_eq!(data.output(), content);
        assert!(h.session.transfer.is_none());
    }

    #[test]
    fn test_retr_failures() {
        let mut h = harness();
        h.login();
        h.pasv();
        assert_eq!(h.send("RETR"), "501 Syntax error in parameters or arguments.\r\n");
        assert_eq!(h.send("RETR /nowhere.bin"), "451 Local error in processing.\r\n");
        assert_eq!(h.send("RETR /LittleFS/nope.bin"), "450 File not found.\r\n");
    }

    #[test]
    fn test_stor_uploads_into_current_directory() {
        let mut h = harness();
        h.login();
        h.send("CWD /SD");
        let id = h.pasv();
        let data = h.connect_data(id);
        assert_eq!(h.send("STOR report.txt"), "150 Opening data connection.\r\n");

        h.session.handle_event(SessionEvent::DataReceived {
            transfer: id,
            data: b"temperature=21\n".to_vec(),
        });
        h.session.handle_event(SessionEvent::DataClosed { transfer: id });
        assert_eq!(h.control.take_output(), "226 Transfer complete.\r\n");
        assert_eq!(h.sd.read_file("/report.txt").unwrap(), b"temperature=21\n");
        assert!(!data.is_closed());
    }

    #[test]
    fn test_stor_beyond_quota_deletes_partial_file() {
        let mut h = harness_with(STOR_QUOTA_MARGIN + 1000, 5);
        h.login();
        let id = h.pasv();
        let data = h.connect_data(id);
        h.send("STOR /LittleFS/big.bin");

        for _ in 0..3 {
            h.session.handle_event(SessionEvent::DataReceived {
                transfer: id,
                data: vec![0xAA; 512],
            });
        }
        assert!(data.is_closed());
        assert!(!h.little.exists("/big.bin"));

        h.session.handle_event(SessionEvent::DataClosed { transfer: id });
        assert_eq!(h.control.take_output(), "452 Insufficient storage space.\r\n");
        assert!(!h.little.exists("/big.bin"));
    }

    #[test]
    fn test_stor_into_root_is_refused() {
        let mut h = harness();
        h.login();
        h.pasv();
        assert_eq!(
            h.send("STOR report.txt"),
            "550 Cannot write to read-only directory.\r\n"
        );
        assert_eq!(
            h.send("STOR /LittleFS"),
            "550 Cannot write to read-only directory.\r\n"
        );
        assert_eq!(h.send("STOR"), "501 Syntax error in parameters or arguments.\r\n");
    }

    #[test]
    fn test_stor_open_failure_tears_transfer_down() {
        let mut h = harness();
        h.login();
        h.pasv();
        assert_eq!(
            h.send("STOR /LittleFS/no/such/dir.txt"),
            "553 Cannot open file for writing.\r\n"
        );
        assert!(h.session.transfer.is_none());
        assert!(h.transport.listeners()[0].1.is_closed());
    }

    #[test]
    fn test_second_file_command_on_one_transfer_is_bad_sequence() {
        let mut h = harness();
        h.little.insert_file("/a.txt", b"a").unwrap();
        h.login();
        h.pasv();
        assert_eq!(h.send("RETR /LittleFS/a.txt"), "");
        assert_eq!(h.send("STOR /LittleFS/b.txt"), "503 Bad sequence of commands.\r\n");
        assert!(!h.little.exists("/b.txt"));
    }

    #[test]
    fn test_list_root_shows_one_entry_per_mount() {
        let mut h = harness();
        h.login();
        let id = h.pasv();
        h.send("LIST");
        let data = h.connect_data(id);
        assert_eq!(h.finish(id, &data), "150 Opening data connection.\r\n226 Transfer complete.\r\n");

        let listing = String::from_utf8(data.output()).unwrap();
        let lines: Vec<&str> = listing.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("drwxr-xr-x 1 user group        0 "));
        assert!(lines[0].ends_with(" LittleFS (1.00MB of 1.00MB)"), "{}", lines[0]);
        assert!(lines[1].ends_with(" SD (1.00MB of 1.00MB)"), "{}", lines[1]);
    }

    #[test]
    fn test_list_directory_with_options() {
        let mut h = harness();
        h.little.insert_file("/logs/a.txt", b"abc").unwrap();
        h.little.insert_file("/logs/b.txt", b"").unwrap();
        h.login();
        h.send("CWD /LittleFS");
        let id = h.pasv();
        let data = h.connect_data(id);
        h.send("LIST -la logs");
        h.finish(id, &data);

        let listing = String::from_utf8(data.output()).unwrap();
        let lines: Vec<&str> = listing.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("-rw-r--r-- 1 user group        3 "));
        assert!(lines[0].ends_with(" a.txt"));
        assert!(lines[1].ends_with(" b.txt"));
    }

    #[test]
    fn test_size() {
        let mut h = harness();
        h.sd.insert_file("/music/a.mp3", &[0u8; 4242]).unwrap();
        h.login();
        h.send("CWD /SD/music");
        assert_eq!(h.send("SIZE a.mp3"), "213 4242\r\n");
        assert_eq!(h.send("SIZE b.mp3"), "450 File not found.\r\n");
        assert_eq!(h.send("SIZE /b.mp3"), "450 File not found.\r\n");
        assert_eq!(h.send("SIZE"), "501 Syntax error in parameters or arguments.\r\n");
    }

    #[test]
    fn test_rnto_without_rnfr_touches_nothing() {
        let mut h = harness();
        h.little.insert_file("/a.txt", b"a").unwrap();
        h.login();
        assert_eq!(h.send("RNTO /LittleFS/b.txt"), "503 Bad sequence of commands.\r\n");
        assert!(h.little.exists("/a.txt"));
        assert!(!h.little.exists("/b.txt"));
    }

    #[test]
    fn test_rnto_onto_existing_destination() {
        let mut h = harness();
        h.little.insert_file("/a.txt", b"a").unwrap();
        h.little.insert_file("/b.txt", b"b").unwrap();
        h.login();
        h.send("CWD /LittleFS");
        assert_eq!(h.send("RNFR a.txt"), "350 Ready for rename.\r\n");
        assert_eq!(h.send("RNTO b.txt"), "553 Destination file already exists.\r\n");
        assert_eq!(h.little.read_file("/a.txt").unwrap(), b"a");
        assert_eq!(h.little.read_file("/b.txt").unwrap(), b"b");
        assert_eq!(h.send("RNTO c.txt"), "503 Bad sequence of commands.\r\n");
    }

    #[test]
    fn test_rename_within_and_across_filesystems() {
        let mut h = harness();
        h.little.insert_file("/a.txt", b"payload").unwrap();
        h.login();

        assert_eq!(h.send("RNFR /LittleFS/missing"), "550 File not found.\r\n");
        assert_eq!(h.send("RNFR /Elsewhere/a"), "451 Local error in processing.\r\n");

        h.send("RNFR /LittleFS/a.txt");
        assert_eq!(h.send("RNTO /LittleFS/b.txt"), "250 File renamed successfully.\r\n");
        assert!(!h.little.exists("/a.txt"));

        h.send("RNFR /LittleFS/b.txt");
        assert_eq!(h.send("RNTO /SD/c.txt"), "250 File renamed successfully.\r\n");
        assert!(!h.little.exists("/b.txt"));
        assert_eq!(h.sd.read_file("/c.txt").unwrap(), b"payload");
    }

    #[test]
    fn test_directories_do_not_move_across_filesystems() {
        let mut h = harness();
        h.little.insert_file("/logs/a.txt", b"a").unwrap();
        h.login();
        h.send("RNFR /LittleFS/logs");
        assert_eq!(h.send("RNTO /SD/logs"), "450 Rename failed.\r\n");
        assert!(h.little.exists("/logs/a.txt"));
        assert!(!h.sd.exists("/logs"));
    }

    #[test]
    fn test_dele_mkd_rmd() {
        let mut h = harness();
        h.little.insert_file("/a.txt", b"a").unwrap();
        h.login();
        h.send("CWD /LittleFS");

        assert_eq!(h.send("DELE a.txt"), "250 File deleted successfully.\r\n");
        assert_eq!(h.send("DELE a.txt"), "550 File not found.\r\n");
        assert_eq!(h.send("DELE"), "501 Syntax error in parameters or arguments.\r\n");

        assert_eq!(h.send("MKD logs"), "257 \"/LittleFS/logs\" created.\r\n");
        assert_eq!(h.send("MKD /SD/music/"), "257 \"/SD/music\" created.\r\n");
        assert!(h.little.exists("/logs"));
        assert_eq!(h.send("MKD logs"), "553 File name already exists.\r\n");
        assert_eq!(h.send("MKD x/y"), "550 Failed to create directory.\r\n");
        assert_eq!(h.send("MKD /top"), "451 Local error in processing.\r\n");

        h.little.insert_file("/logs/keep.txt", b"k").unwrap();
        assert_eq!(h.send("RMD logs"), "550 Failed to delete directory.\r\n");
        assert_eq!(h.send("DELE logs"), "450 Cannot delete file.\r\n");
        h.send("DELE logs/keep.txt");
        assert_eq!(h.send("RMD logs"), "250 Directory successfully deleted.\r\n");
        assert_eq!(h.send("RMD logs"), "550 File not found.\r\n");
    }

    #[test]
    fn test_informational_commands() {
        let mut h = harness();
        h.login();
        assert_eq!(h.send("SYST"), "215 UNIX Type: L8\r\n");
        assert_eq!(
            h.send("FEAT"),
            "211-Features:\r\n PASV\r\n SIZE\r\n UTF8\r\n TVFS\r\n211 End\r\n"
        );
        assert_eq!(h.send("NOOP"), "200 Ok.\r\n");
        assert_eq!(h.send("PORT 1,2,3,4,5,6"), "502 Command not implemented.\r\n");
        assert_eq!(h.send("USER admin"), "502 Command not implemented.\r\n");
    }

    #[test]
    fn test_type_and_opts() {
        let mut h = harness();
        h.login();
        assert_eq!(h.send("TYPE I"), "200 Type set to I\r\n");
        assert_eq!(h.session.transfer_type, TransferType::Image);
        assert_eq!(h.send("TYPE x"), "504 Unknown data type x\r\n");
        assert_eq!(h.session.transfer_type, TransferType::Image);
        assert_eq!(h.send("TYPE"), "501 Syntax error in parameters or arguments.\r\n");

        assert_eq!(h.send("OPTS utf8 on"), "200 UTF8 ON\r\n");
        assert!(h.session.utf8);
        assert_eq!(h.send("OPTS UTF8 OFF"), "200 UTF8 OFF\r\n");
        assert!(!h.session.utf8);
        assert_eq!(h.send("OPTS MODE Z"), "200 MODE Z\r\n");
    }

    #[test]
    fn test_quit_closes_control_and_transfer() {
        let mut h = harness();
        h.login();
        h.pasv();
        assert_eq!(h.send("QUIT"), "221 Goodbye.\r\n");
        assert!(h.session.is_closed());
        assert!(h.control.is_closed());
        assert!(h.transport.listeners()[0].1.is_closed());
        assert_eq!(h.send("NOOP"), "");
    }

    #[test]
    fn test_pipelined_and_fragmented_commands() {
        let mut h = harness();
        h.control.take_output();
        h.session
            .handle_event(SessionEvent::ControlData(b"USER admin\r\nPASS es".to_vec()));
        assert_eq!(h.control.take_output(), "331 User name okay, need password.\r\n");
        h.session
            .handle_event(SessionEvent::ControlData(b"p32\r\nNOOP\r\n".to_vec()));
        assert_eq!(
            h.control.take_output(),
            "230 User logged in, proceed.\r\n200 Ok.\r\n"
        );
    }

    #[test]
    fn test_overlong_line_is_discarded() {
        let mut h = harness();
        h.login();
        h.session
            .handle_event(SessionEvent::ControlData(vec![b'A'; 5000]));
        assert_eq!(h.control.take_output(), "500 Command line too long.\r\n");
        assert_eq!(h.send("NOOP"), "200 Ok.\r\n");
    }

    #[test]
    fn test_timeout_and_disconnect() {
        let mut h = harness();
        h.control.take_output();
        h.session.handle_event(SessionEvent::ControlTimeout);
        assert_eq!(h.control.take_output(), "421 Timeout.\r\n");
        assert!(h.session.is_closed());

        let mut h = harness();
        h.login();
        h.pasv();
        h.session.handle_event(SessionEvent::ControlClosed);
        assert!(h.session.is_closed());
        assert!(h.transport.listeners()[0].1.is_closed());
    }

    #[test]
    fn test_idle_timeout_spares_running_transfers() {
        let mut h = harness();
        h.login();
        let id = h.pasv();
        h.connect_data(id);
        h.send("STOR /SD/upload.bin");

        h.session.handle_event(SessionEvent::DataReceived {
            transfer: id,
            data: b"first ".to_vec(),
        });
        h.session.handle_event(SessionEvent::ControlTimeout);
        assert!(!h.session.is_closed());
        assert_eq!(h.control.take_output(), "");

        h.session.handle_event(SessionEvent::DataReceived {
            transfer: id,
            data: b"second".to_vec(),
        });
        h.session.handle_event(SessionEvent::DataClosed { transfer: id });
        assert_eq!(h.control.take_output(), "226 Transfer complete.\r\n");
        assert_eq!(h.sd.read_file("/upload.bin").unwrap(), b"first second");

        // idle again once the transfer is over, and a bare PASV does not count
        h.pasv();
        h.session.handle_event(SessionEvent::ControlTimeout);
        assert_eq!(h.control.take_output(), "421 Timeout.\r\n");
        assert!(h.session.is_closed());
    }

    #[test]
    fn test_stale_transfer_events_are_ignored() {
        let mut h = harness();
        h.little.insert_file("/a.txt", b"abc").unwrap();
        h.login();
        let first = h.pasv();
        let second = h.pasv();
        h.send("RETR /LittleFS/a.txt");
        let data = h.connect_data(second);
        h.control.take_output();

        h.session.handle_event(SessionEvent::DataClosed { transfer: first });
        h.session.handle_event(SessionEvent::DataAcked { transfer: first, len: 3 });
        assert_eq!(h.control.take_output(), "");
        assert!(h.session.transfer.is_some());

        assert_eq!(h.finish(second, &data), "226 Transfer complete.\r\n");
        assert_eq!(data.output(), b"abc");
    }

    #[test]
    fn test_registry_enforces_limit_and_releases_on_drop() {
        let registry = SessionRegistry::new(2);
        let peer: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        let a = registry.try_register(peer).unwrap();
        let b = registry.try_register(peer).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(registry.try_register(peer).is_none());
        assert_eq!(registry.active_count(), 2);

        drop(a);
        assert_eq!(registry.active_count(), 1);
        let c = registry.try_register(peer).unwrap();
        assert_eq!(registry.sessions.lock()[&c.id()].peer, peer);
    }
}
