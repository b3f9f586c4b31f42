use crate::session::Session;
use log::info;

/// Handles the QUIT FTP command.
///
/// Says goodbye and closes the control connection, tearing down any
/// passive transfer on the way.
pub fn handle_quit_command(session: &mut Session, _arg: String) {
    info!("Received QUIT command. Closing connection.");
    session.reply("221 Goodbye.");
    session.close();
}
