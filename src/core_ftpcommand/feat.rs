use crate::constants::FEATURES;
use crate::session::Session;

/// Handles the FEAT FTP command with the multi-line 211 reply.
pub fn handle_feat_command(session: &mut Session, _arg: String) {
    let mut response = String::from("211-Features:\r\n");
    for feature in FEATURES {
        response.push(' ');
        response.push_str(feature);
        response.push_str("\r\n");
    }
    response.push_str("211 End");
    session.reply(&response);
}
