use crate::core_ftpcommand::utils::{resolve_or_reply, SYNTAX_ERROR};
use crate::session::Session;
use log::debug;

/// Handles the RNFR (Rename From) FTP command.
///
/// Stages the source path for the following RNTO.
pub fn handle_rnfr_command(session: &mut Session, arg: String) {
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

    debug!("Staged {} for rename", target);
    session.rename_from = Some(target);
    session.reply("350 Ready for rename.");
}
