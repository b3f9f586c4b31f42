use crate::session::Session;

pub fn handle_syst_command(session: &mut Session, _arg: String) {
    session.reply("215 UNIX Type: L8");
}
