use crate::core_ftpcommand::cwd::change_directory;
use crate::session::Session;

/// Handles the CDUP FTP command, a CWD to the parent directory.
pub fn handle_cdup_command(session: &mut Session, _arg: String) {
    change_directory(session, "..", true);
}
