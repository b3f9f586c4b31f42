#[derive(Eq, Hash, PartialEq, Debug, Clone, Copy)]
pub enum FtpCommand {
    USER,
    PASS,
    QUIT,
    CWD,
    CDUP,
    PASV,
    TYPE,
    OPTS,
    STOR,
    SIZE,
    RETR,
    LIST,
    RNFR,
    RNTO,
    DELE,
    RMD,
    MKD,
    PWD,
    SYST,
    FEAT,
    NOOP,
}

impl FtpCommand {
    pub fn from_str(cmd: &str) -> Option<FtpCommand> {
        match cmd.to_ascii_uppercase().as_str() {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "QUIT" => Some(FtpCommand::QUIT),
            "CWD" => Some(FtpCommand::CWD),
            "CDUP" => Some(FtpCommand::CDUP),
            "PASV" => Some(FtpCommand::PASV),
            "TYPE" => Some(FtpCommand::TYPE),
            "OPTS" => Some(FtpCommand::OPTS),
            "STOR" => Some(FtpCommand::STOR),
            "SIZE" => Some(FtpCommand::SIZE),
            "RETR" => Some(FtpCommand::RETR),
            "LIST" => Some(FtpCommand::LIST),
            "RNFR" => Some(FtpCommand::RNFR),
            "RNTO" => Some(FtpCommand::RNTO),
            "DELE" => Some(FtpCommand::DELE),
            "RMD" => Some(FtpCommand::RMD),
            "MKD" => Some(FtpCommand::MKD),
            "PWD" => Some(FtpCommand::PWD),
            "SYST" => Some(FtpCommand::SYST),
            "FEAT" => Some(FtpCommand::FEAT),
            "NOOP" => Some(FtpCommand::NOOP),
            _ => None,
        }
    }
}
