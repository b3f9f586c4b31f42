use crate::constants::ANONYMOUS_USER;
use crate::core_ftpcommand::utils::SYNTAX_ERROR;
use crate::session::{AuthState, Session};
use log::{info, warn};

/// Handles the USER FTP command.
///
/// Only the configured account can log in. Anonymous users are asked for an
/// account, which the server never accepts.
///
/// # Arguments
///
/// * `session` - The client session being authenticated.
/// * `username` - The username provided by the client.
pub fn handle_user_command(session: &mut Session, username: String) {
    if username.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    if username == session.context.config.username {
        info!("Username accepted: {}", username);
        session.auth = AuthState::AwaitingPassword;
        session.reply("331 User name okay, need password.");
        return;
    }

    session.auth = AuthState::AwaitingUser;
    if username == ANONYMOUS_USER {
        info!("Anonymous login attempt");
        session.reply("332 Need account for login.");
    } else {
        warn!("Unknown username: {}", username);
        session.reply("530 Not logged in.");
    }
}
