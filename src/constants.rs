// src/constants.rs

pub const USERNAME_REGEX: &str = r"^[a-zA-Z0-9._-]{1,32}$";
pub const MOUNT_SEGMENT_REGEX: &str = r"^[A-Za-z0-9._-]+$";

/// Longest command line accepted before a CRLF shows up.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Read-ahead buffer of a RETR/LIST transfer.
pub const DATA_BUFFER_SIZE: usize = 2048;

/// Headroom kept free on the target filesystem during STOR.
pub const STOR_QUOTA_MARGIN: u64 = 8192;

/// Chunk size used when RNTO copies a file across filesystems.
pub const COPY_BUFFER_SIZE: usize = 2048;

/// Depth of the per-session event queue fed by the transport tasks.
pub const SESSION_EVENT_QUEUE: usize = 64;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/mountftpd.conf";
pub const DEFAULT_GREETING: &str = "Service ready for new user.";
pub const ANONYMOUS_USER: &str = "anonymous";

pub const FEATURES: [&str; 4] = ["PASV", "SIZE", "UTF8", "TVFS"];
