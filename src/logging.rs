use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use env_logger::{Env, Target};

use crate::env::LauncherPaths;

/// Append-only log file that is moved aside to a single backup slot once it
/// grows past `max_bytes`. The file is opened per write so no handle is held
/// between records.
pub struct RotatingLogFile {
    path: PathBuf,
    backup: PathBuf,
    max_bytes: u64,
}

impl RotatingLogFile {
    pub fn new(path: PathBuf, backup: PathBuf, max_bytes: u64) -> Self {
        Self {
            path,
            backup,
            max_bytes,
        }
    }

    fn rotate_if_needed(&self) -> io::Result<()> {
        let len = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err),
        };
        if len <= self.max_bytes {
            return Ok(());
        }
        match fs::remove_file(&self.backup) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        fs::rename(&self.path, &self.backup)
    }
}

impl Write for RotatingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        // A failed rotation must not cost the record itself.
        let _ = self.rotate_if_needed();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Level used when `RUST_LOG` is unset. Stderr shares the terminal with the
/// progress spinner, so only warnings and errors go there by default.
fn default_filter(to_file: bool) -> &'static str {
    if to_file { "info" } else { "warn" }
}

/// Install the global logger. Without `to_file` records go to stderr as
/// usual; with it they are appended to the launcher log.
pub fn init(to_file: bool, paths: &LauncherPaths, max_bytes: u64) {
    let mut builder =
        env_logger::Builder::from_env(Env::default().default_filter_or(default_filter(to_file)));
    if to_file {
        let sink = RotatingLogFile::new(paths.log_file(), paths.rotated_log_file(), max_bytes);
        builder
            .target(Target::Pipe(Box::new(sink)))
            .write_style(env_logger::WriteStyle::Never)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} {} [{}] {}",
                    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    record.level(),
                    record.target(),
                    record.args()
                )
            });
    }
    builder.init();
}

/// Push out anything the logger still buffers.
pub fn flush() {
    log::logger().flush();
}
