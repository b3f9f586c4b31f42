use crate::core_ftpcommand::utils::{resolve_or_reply, SYNTAX_ERROR};
use crate::session::Session;
use log::{info, warn};

/// Handles the MKD FTP command.
///
/// # Arguments
///
/// * `session` - The client session.
/// * `arg` - The directory to create, absolute or relative to the working directory.
pub fn handle_mkd_command(session: &mut Session, arg: String) {
    if arg.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    let Some((target, resolved)) = resolve_or_reply(session, &arg) else {
        return;
    };

    if resolved.fs.exists(&resolved.path) {
        session.reply("553 File name already exists.");
        return;
    }

    match resolved.fs.mkdir(&resolved.path) {
        Ok(()) => {
            info!("Created directory {}", target);
            session.reply(&format!("257 \"{}\" created.", target.as_file_path()));
        }
        Err(e) => {
            warn!("Failed to create directory {}: {}", target, e);
            session.reply("550 Failed to create directory.");
        }
    }
}
