use crate::core_ftpcommand::utils::{resolve_or_reply, SYNTAX_ERROR};
use crate::session::Session;
use log::{info, warn};

/// Handles the RMD FTP command. Only empty directories can be removed.
pub fn handle_rmd_command(session: &mut Session, arg: String) {
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

    match resolved.fs.rmdir(&resolved.path) {
        Ok(()) => {
            info!("Removed directory {}", target);
            session.reply("250 Directory successfully deleted.");
        }
        Err(e) => {
            warn!("Failed to remove directory {}: {}", target, e);
            session.reply("550 Failed to delete directory.");
        }
    }
}
