use crate::core_vfs::{DirEntry, Mount};
use chrono::{DateTime, Datelike, Local, TimeZone, Timelike};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Formats an entry as an `ls -l` style line, using local time.
pub fn format_entry(entry: &DirEntry) -> String {
    format_entry_at(entry, &Local::now())
}

/// Same as [`format_entry`] with an explicit "now", whose timezone is also
/// used to render the entry's timestamp.
pub fn format_entry_at<Tz: TimeZone>(entry: &DirEntry, now: &DateTime<Tz>) -> String {
    let date = match entry.modified {
        None => "Jan  1 00:00".to_string(),
        Some(modified) => {
            let modified = modified.with_timezone(&now.timezone());
            let month = MONTHS[modified.month0() as usize];
            if modified.year() == now.year() {
                format!(
                    "{} {:>2} {:02}:{:02}",
                    month,
                    modified.day(),
                    modified.hour(),
                    modified.minute()
                )
            } else {
                format!("{} {:>2}  {:>4}", month, modified.day(), modified.year())
            }
        }
    };

    let name = entry.name.strip_prefix('/').unwrap_or(&entry.name);

    if entry.is_dir {
        format!("drwxr-xr-x 1 user group {:>8} {} {}\r\n", 0, date, name)
    } else {
        format!("-rw-r--r-- 1 user group {:>8} {} {}\r\n", entry.size, date, name)
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let value = bytes as f64;
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if value < KB * KB {
        format!("{:.2}KB", value / KB)
    } else if value < KB * KB * KB {
        format!("{:.2}MB", value / (KB * KB))
    } else {
        format!("{:.2}GB", value / (KB * KB * KB))
    }
}

/// Synthetic root listing entry describing a mount and its free space.
pub fn usage_entry(mount: &Mount) -> DirEntry {
    let total = mount.fs.total_bytes();
    let free = mount.fs.free_bytes();
    DirEntry {
        name: format!(
            "{} ({} of {})",
            mount.prefix.as_file_path(),
            format_bytes(free),
            format_bytes(total)
        ),
        is_dir: true,
        size: 0,
        modified: None,
    }
}
