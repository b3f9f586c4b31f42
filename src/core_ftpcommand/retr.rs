use crate::core_ftpcommand::utils::{resolve_or_reply, transfer_ready, SYNTAX_ERROR};
use crate::core_transfer::passive::TransferCommand;
use crate::core_vfs::OpenMode;
use crate::session::Session;
use log::{debug, info};

const NOT_FOUND: &str = "450 File not found.";

/// Handles the RETR FTP command by queueing the file on the passive
/// transfer.
pub fn handle_retr_command(session: &mut Session, arg: String) {
    if !transfer_ready(session) {
        return;
    }

    if arg.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    let Some((target, resolved)) = resolve_or_reply(session, &arg) else {
        return;
    };

    let file = match resolved.fs.open(&resolved.path, OpenMode::Read) {
        Ok(file) if !file.is_directory() => file,
        Ok(_) => {
            debug!("RETR of directory {}", target);
            session.reply(NOT_FOUND);
            return;
        }
        Err(e) => {
            debug!("RETR of {} failed: {}", target, e);
            session.reply(NOT_FOUND);
            return;
        }
    };

    info!(
        "Sending {} ({} bytes)",
        target.as_file_path(),
        file.size()
    );
    if let Some(transfer) = session.transfer.as_mut() {
        transfer.set_command(TransferCommand::Retr(file), session.control.as_mut());
    }
}
