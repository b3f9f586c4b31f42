use crate::core_ftpcommand::utils::SYNTAX_ERROR;
use crate::core_vfs::OpenMode;
use crate::session::Session;
use log::{debug, warn};

/// Handles the CWD FTP command.
///
/// # Arguments
///
/// * `session` - The client session whose working directory changes.
/// * `arg` - Target directory, absolute or relative to the current one.
pub fn handle_cwd_command(session: &mut Session, arg: String) {
    change_directory(session, &arg, false);
}

/// Moves the working directory to `path`. The root always exists; any other
/// target must resolve to a directory on an available mount.
pub fn change_directory(session: &mut Session, path: &str, cdup: bool) {
    if path.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    let target = session.cwd.join(path);
    let found = target.is_root()
        || match session.resolve(&target) {
            Ok(resolved) => match resolved.fs.open(&resolved.path, OpenMode::Read) {
                Ok(mut handle) => {
                    let is_dir = handle.is_directory();
                    if let Err(e) = handle.close() {
                        warn!("Failed to close {}: {}", resolved.path, e);
                    }
                    is_dir
                }
                Err(e) => {
                    debug!("CWD to {} failed: {}", target, e);
                    false
                }
            },
            Err(e) => {
                debug!("CWD to {} failed: {}", target, e);
                false
            }
        };

    if !found {
        session.reply("550 Directory not found.");
        return;
    }

    debug!("Working directory is now {}", target);
    session.cwd = target;
    if cdup {
        session.reply("200 Working directory changed.");
    } else {
        session.reply("250 Working directory changed.");
    }
}
