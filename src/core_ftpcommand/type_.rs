use crate::core_ftpcommand::utils::SYNTAX_ERROR;
use crate::helpers::first_word;
use crate::session::{Session, TransferType};
use log::debug;

/// Handles the TYPE FTP command. The type is recorded but transfers are
/// always binary.
pub fn handle_type_command(session: &mut Session, arg: String) {
    let kind = first_word(&arg);
    if kind.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    let transfer_type = match kind.to_ascii_uppercase().as_str() {
        "A" => TransferType::Ascii,
        "E" => TransferType::Ebcdic,
        "I" => TransferType::Image,
        "L" => TransferType::Local,
        _ => {
            session.reply(&format!("504 Unknown data type {}", kind));
            return;
        }
    };

    debug!("Transfer type set to {:?}", transfer_type);
    session.transfer_type = transfer_type;
    session.reply(&format!("200 Type set to {}", kind));
}
