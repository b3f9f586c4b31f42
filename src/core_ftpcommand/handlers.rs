use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_ftpcommand::{
    cdup, cwd, dele, feat, list, mkd, noop, opts, pwd, quit, retr, rmd, rnfr, rnto, size, stor,
    syst, type_,
};
use crate::core_network::pasv;
use crate::session::Session;
use std::collections::HashMap;

/// Handler for a command issued by a logged-in client. The argument is the
/// rest of the command line with leading spaces removed.
pub type CommandHandler = fn(&mut Session, String);

pub fn initialize_command_handlers() -> HashMap<FtpCommand, CommandHandler> {
    let mut handlers: HashMap<FtpCommand, CommandHandler> = HashMap::new();

    handlers.insert(FtpCommand::CWD, cwd::handle_cwd_command);
    handlers.insert(FtpCommand::CDUP, cdup::handle_cdup_command);
    handlers.insert(FtpCommand::QUIT, quit::handle_quit_command);

    // Transfer parameters
    handlers.insert(FtpCommand::PASV, pasv::handle_pasv_command);
    handlers.insert(FtpCommand::TYPE, type_::handle_type_command);
    handlers.insert(FtpCommand::OPTS, opts::handle_opts_command);

    // File actions
    handlers.insert(FtpCommand::STOR, stor::handle_stor_command);
    handlers.insert(FtpCommand::SIZE, size::handle_size_command);
    handlers.insert(FtpCommand::RETR, retr::handle_retr_command);
    handlers.insert(FtpCommand::LIST, list::handle_list_command);
    handlers.insert(FtpCommand::RNFR, rnfr::handle_rnfr_command);
    handlers.insert(FtpCommand::RNTO, rnto::handle_rnto_command);
    handlers.insert(FtpCommand::DELE, dele::handle_dele_command);
    handlers.insert(FtpCommand::RMD, rmd::handle_rmd_command);
    handlers.insert(FtpCommand::MKD, mkd::handle_mkd_command);
    handlers.insert(FtpCommand::PWD, pwd::handle_pwd_command);

    // Informational
    handlers.insert(FtpCommand::SYST, syst::handle_syst_command);
    handlers.insert(FtpCommand::FEAT, feat::handle_feat_command);
    handlers.insert(FtpCommand::NOOP, noop::handle_noop_command);

    handlers
}
