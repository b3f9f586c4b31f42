use crate::core_ftpcommand::utils::{resolve_or_reply, SYNTAX_ERROR};
use crate::session::Session;
use log::{info, warn};

/// Handles the DELE FTP command.
pub fn handle_dele_command(session: &mut Session, arg: String) {
    if arg.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    let Some((target, resolved)) = resolve_or_reply(session, &arg) else {
        return;
    };

    if !resolved.fs.exists(&resolved.path) {
        session.reply("550 File not found.");
        return;
    }

    match resolved.fs.remove(&resolved.path) {
        Ok(()) => {
            info!("Deleted {}", target.as_file_path());
            session.reply("250 File deleted successfully.");
        }
        Err(e) => {
            warn!("Failed to delete {}: {}", target.as_file_path(), e);
            session.reply("450 Cannot delete file.");
        }
    }
}
