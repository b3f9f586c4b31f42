use crate::core_ftpcommand::utils::SYNTAX_ERROR;
use crate::session::{AuthState, Session};
use log::{info, warn};

/// Handles the PASS FTP command.
///
/// The password is only checked right after the configured USER. Each
/// failure counts towards `max_login_failures`; reaching it closes the
/// control connection.
pub fn handle_pass_command(session: &mut Session, password: String) {
    if password.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    if session.auth == AuthState::AwaitingPassword
        && session.context.config.verify_password(&password)
    {
        info!("User {} logged in", session.context.config.username);
        session.auth = AuthState::LoggedIn;
        session.login_failures = 0;
        session.reply("230 User logged in, proceed.");
        return;
    }

    session.auth = AuthState::AwaitingUser;
    session.login_failures += 1;
    warn!("Login failure #{}", session.login_failures);

    let limit = session.context.config.max_login_failures;
    if limit > 0 && session.login_failures >= limit {
        warn!("Too many login failures, dropping the client");
        session.reply("421 Too many login failures, closing control connection.");
        session.close();
    } else {
        session.reply("530 Not logged in.");
    }
}
