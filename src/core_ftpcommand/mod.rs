// Command framing, the verb table and one handler file per FTP command
pub mod framer;
pub mod ftpcommand;
pub mod handlers;

// Authentication
pub mod pass;
pub mod user;

// Navigation and session control
pub mod cdup;
pub mod cwd;
pub mod opts;
pub mod quit;
pub mod type_;

// File actions
pub mod dele;
pub mod list;
pub mod mkd;
pub mod retr;
pub mod rmd;
pub mod rnfr;
pub mod rnto;
pub mod size;
pub mod stor;

// Informational
pub mod feat;
pub mod noop;
pub mod pwd;
pub mod syst;

// The utils and common functions are here
pub mod utils;
