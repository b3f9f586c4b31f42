use crate::session::Session;

pub fn handle_noop_command(session: &mut Session, _arg: String) {
    session.reply("200 Ok.");
}
