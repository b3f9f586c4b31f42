use crate::core_ftpcommand::utils::{resolve_or_reply, transfer_ready, SYNTAX_ERROR};
use crate::core_transfer::passive::TransferCommand;
use crate::core_vfs::OpenMode;
use crate::session::Session;
use log::{info, warn};

/// Handles the STOR FTP command.
///
/// Opens the target for writing and hands it to the pending passive
/// transfer; the upload itself runs once the data connection is up. Files
/// cannot be created directly under the root, which only holds mounts.
///
/// # Arguments
///
/// * `session` - The client session, which must have issued PASV.
/// * `arg` - The file to store, absolute or relative to the working directory.
pub fn handle_stor_command(session: &mut Session, arg: String) {
    if !transfer_ready(session) {
        return;
    }

    if arg.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    let target = session.cwd.join(&arg);
    if target.is_root() || target.parent().is_root() {
        session.reply("550 Cannot write to read-only directory.");
        return;
    }

    let Some((target, resolved)) = resolve_or_reply(session, &arg) else {
        return;
    };

    match resolved.fs.open(&resolved.path, OpenMode::Write) {
        Ok(file) => {
            info!("Receiving upload into {}", target.as_file_path());
            let command = TransferCommand::Stor {
                file,
                fs: resolved.fs,
            };
            if let Some(transfer) = session.transfer.as_mut() {
                transfer.set_command(command, session.control.as_mut());
            }
        }
        Err(e) => {
            warn!("Cannot open {} for writing: {}", target.as_file_path(), e);
            session.reply("553 Cannot open file for writing.");
            session.transfer = None;
        }
    }
}
