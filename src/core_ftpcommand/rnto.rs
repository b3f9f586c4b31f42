use crate::constants::COPY_BUFFER_SIZE;
use crate::core_ftpcommand::utils::{resolve_or_reply, BAD_SEQUENCE, SYNTAX_ERROR};
use crate::core_vfs::{OpenMode, Resolved};
use crate::session::Session;
use log::{error, info, warn};
use std::io;

/// Handles the RNTO (Rename To) FTP command.
///
/// The staged RNFR path is consumed whatever the outcome. Within one
/// filesystem this is a plain rename; across filesystems the file is copied
/// and the source removed afterwards.
///
/// # Arguments
///
/// * `session` - The client session holding the staged source path.
/// * `arg` - The new name of the file or directory.
pub fn handle_rnto_command(session: &mut Session, arg: String) {
    let Some(from) = session.rename_from.take() else {
        session.reply(BAD_SEQUENCE);
        return;
    };

    if arg.is_empty() {
        session.reply(SYNTAX_ERROR);
        return;
    }

    let Some((to, destination)) = resolve_or_reply(session, &arg) else {
        return;
    };

    if destination.fs.exists(&destination.path) {
        session.reply("553 Destination file already exists.");
        return;
    }

    let result = session.resolve(&from).map_err(io::Error::other).and_then(|source| {
        if source.mount == destination.mount {
            source.fs.rename(&source.path, &destination.path)
        } else {
            move_across(&source, &destination)
        }
    });

    match result {
        Ok(()) => {
            info!("Renamed {} to {}", from.as_file_path(), to.as_file_path());
            session.reply("250 File renamed successfully.");
        }
        Err(e) => {
            warn!(
                "Rename of {} to {} failed: {}",
                from.as_file_path(),
                to.as_file_path(),
                e
            );
            session.reply("450 Rename failed.");
        }
    }
}

/// Copies a regular file to another filesystem, then removes the source.
/// A partially written destination is removed again.
fn move_across(source: &Resolved, destination: &Resolved) -> io::Result<()> {
    let mut input = source.fs.open(&source.path, OpenMode::Read)?;
    if input.is_directory() {
        return Err(io::Error::other("directories cannot move across filesystems"));
    }

    let mut output = destination.fs.open(&destination.path, OpenMode::Write)?;
    let copied = (|| {
        let mut buffer = [0u8; COPY_BUFFER_SIZE];
        loop {
            let n = input.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            output.write_all(&buffer[..n])?;
        }
        output.close()
    })();

    if let Err(e) = copied {
        drop(output);
        if let Err(cleanup) = destination.fs.remove(&destination.path) {
            error!("Failed to remove partial copy {}: {}", destination.path, cleanup);
        }
        return Err(e);
    }

    input.close()?;
    drop(input);
    source.fs.remove(&source.path)
}
