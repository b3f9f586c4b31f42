use crate::session::Session;

/// Handles the OPTS FTP command. Only `UTF8 ON|OFF` has an effect, every
/// other option is acknowledged as is.
pub fn handle_opts_command(session: &mut Session, arg: String) {
    let mut words = arg.split(' ').filter(|word| !word.is_empty());
    let option = words.next().unwrap_or("").to_ascii_uppercase();
    let state = words.next().unwrap_or("").to_ascii_uppercase();

    if option == "UTF8" {
        session.utf8 = state == "ON";
    }

    let response = format!("200 {} {}", option, state);
    session.reply(response.trim_end());
}
