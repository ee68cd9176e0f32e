//! Append-only fatal error log: one `"<unix-seconds> <message>"` line per failure.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use cpme_core::CpmeResult;

/// Append `message` to the log at `path`, creating the file if needed.
pub fn append_fatal(path: &Path, message: &str) -> CpmeResult<()> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One line per failure, even if the message spans several.
    let flat = message.replace('\n', " ");
    writeln!(file, "{timestamp} {flat}")?;
    file.flush()?;
    tracing::debug!(log = %path.display(), "recorded fatal error");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("cpme_log.txt");
        append_fatal(&log, "first failure").unwrap();
        append_fatal(&log, "second\nfailure").unwrap();

        let content = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let (ts, msg) = lines[0].split_once(' ').unwrap();
        assert!(ts.parse::<u64>().unwrap() > 1_600_000_000);
        assert_eq!(msg, "first failure");
        assert!(lines[1].ends_with(" second failure"));
    }
}
