use crate::core_ftpcommand::utils::SYNTAX_ERROR;
use crate::core_vfs::OpenMode;
use crate::session::Session;
use log::{debug, warn};

const NOT_FOUND: &str = "450 File not found.";

/// Handles the SIZE FTP command.
pub fn handle_size_command(session: &mut Session, arg: String) {
    if arg.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    let target = session.cwd.join(&arg);
    let resolved = match session.resolve(&target) {
        Ok(resolved) => resolved,
        Err(e) => {
            debug!("SIZE of {} failed: {}", target, e);
            session.reply(NOT_FOUND);
            return;
        }
    };

    match resolved.fs.open(&resolved.path, OpenMode::Read) {
        Ok(mut file) => {
            let size = file.size();
            if let Err(e) = file.close() {
                warn!("Failed to close {}: {}", target, e);
            }
            session.reply(&format!("213 {}", size));
        }
        Err(e) => {
            debug!("SIZE of {} failed: {}", target, e);
            session.reply(NOT_FOUND);
        }
    }
}
