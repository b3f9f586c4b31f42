use crate::core_ftpcommand::utils::transfer_ready;
use crate::core_transfer::listing::usage_entry;
use crate::core_transfer::passive::{ListSource, TransferCommand};
use crate::core_vfs::OpenMode;
use crate::session::Session;
use log::debug;

/// Handles the LIST FTP command.
///
/// Listing the root, or a path that cannot be opened, yields one usage
/// entry per available mount. `ls` style options such as `-la` are skipped.
pub fn handle_list_command(session: &mut Session, arg: String) {
    if !transfer_ready(session) {
        return;
    }

    let path = arg
        .split(' ')
        .skip_while(|word| word.is_empty() || word.starts_with('-'))
        .collect::<Vec<_>>()
        .join(" ");
    let target = if path.is_empty() {
        session.cwd.clone()
    } else {
        session.cwd.join(&path)
    };

    let opened = if target.is_root() {
        None
    } else {
        match session.resolve(&target) {
            Ok(resolved) => match resolved.fs.open(&resolved.path, OpenMode::Read) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    debug!("LIST of {} failed: {}", target, e);
                    None
                }
            },
            Err(e) => {
                debug!("LIST of {} failed: {}", target, e);
                None
            }
        }
    };

    let source = match opened {
        Some(handle) => ListSource::handle(handle),
        None => ListSource::entries(session.context.mounts.available().map(usage_entry).collect()),
    };

    if let Some(transfer) = session.transfer.as_mut() {
        transfer.set_command(TransferCommand::List(source), session.control.as_mut());
    }
}
