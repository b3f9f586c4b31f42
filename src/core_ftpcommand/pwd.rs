use crate::session::Session;

/// Handles the PWD FTP command. The working directory is always reported
/// in directory form, e.g. `"/LittleFS/logs/"`.
pub fn handle_pwd_command(session: &mut Session, _arg: String) {
    let response = format!("257 \"{}\" is current directory.", session.cwd);
    session.reply(&response);
}
