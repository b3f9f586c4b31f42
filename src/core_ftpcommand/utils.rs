use crate::core_vfs::{Resolved, VirtualPath};
use crate::session::Session;
use log::debug;

pub const SYNTAX_ERROR: &str = "501 Syntax error in parameters or arguments.";
pub const BAD_SEQUENCE: &str = "503 Bad sequence of commands.";

/// Checks that a PASV transfer exists and has no command yet, replying 503
/// otherwise.
pub fn transfer_ready(session: &mut Session) -> bool {
    match session.transfer.as_ref() {
        Some(transfer) if !transfer.has_command() => true,
        Some(_) => {
            debug!("Transfer already carries a command");
            session.reply(BAD_SEQUENCE);
            false
        }
        None => {
            session.reply(BAD_SEQUENCE);
            false
        }
    }
}

/// Resolves a client supplied path against the working directory. When no
/// usable mount owns it the client gets the matching error reply and `None`
/// is returned.
pub fn resolve_or_reply(session: &mut Session, arg: &str) -> Option<(VirtualPath, Resolved)> {
    let target = session.cwd.join(arg);
    match session.resolve(&target) {
        Ok(resolved) => Some((target, resolved)),
        Err(e) => {
            debug!("{}", e);
            session.reply(&e.to_ftp_response());
            None
        }
    }
}
