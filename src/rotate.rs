//! Rotating file writers backing the `file` output target.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{Local, NaiveDate, Utc};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::config::{FileConfig, FileMode};
use crate::error::Result;

/// Backups kept next to the active file in size mode.
pub const MAX_BACKUPS: usize = 2;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Open a writer for `file_name` (e.g. `info.log`) under the configured
/// directory, rotating by size or by calendar day.
pub fn open_writer(file_name: &str, cfg: &FileConfig) -> Result<Box<dyn Write + Send>> {
    let dir = cfg.dir();
    fs::create_dir_all(&dir)?;
    match cfg.mode {
        FileMode::Size => {
            let file = SizeRotatingFile::open(
                &dir,
                file_name,
                cfg.max_bytes(),
                MAX_BACKUPS,
                Duration::from_secs(cfg.max_age_days() * SECS_PER_DAY),
            )?;
            Ok(Box::new(file))
        }
        FileMode::Date => {
            let file = DateRotatingFile::open(&dir, file_name, cfg.max_bytes(), cfg.max_age_days() as usize)?;
            Ok(Box::new(file))
        }
    }
}

/// `info.log` -> (`info`, `log`).
fn split_name(file_name: &str) -> (&str, &str) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, ext),
        _ => (file_name, ""),
    }
}

/// File that is renamed to a timestamped backup once it would exceed
/// `max_bytes`, keeping at most `max_backups` backups no older than
/// `max_age`.
#[derive(Debug)]
pub struct SizeRotatingFile {
    dir: PathBuf,
    file_name: String,
    max_bytes: u64,
    max_backups: usize,
    max_age: Duration,
    file: File,
    written: u64,
}

impl SizeRotatingFile {
    pub fn open(
        dir: &Path,
        file_name: &str,
        max_bytes: u64,
        max_backups: usize,
        max_age: Duration,
    ) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(file_name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();
        Ok(SizeRotatingFile {
            dir: dir.to_path_buf(),
            file_name: file_name.to_string(),
            max_bytes: max_bytes.max(1),
            max_backups,
            max_age,
            file,
            written,
        })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let (stem, ext) = split_name(&self.file_name);
        let stamp = Local::now().format("%Y-%m-%dT%H-%M-%S%.6f");
        let backup = if ext.is_empty() {
            format!("{}-{}", stem, stamp)
        } else {
            format!("{}-{}.{}", stem, stamp, ext)
        };
        fs::rename(self.path(), self.dir.join(backup))?;
        self.file = OpenOptions::new().create(true).append(true).open(self.path())?;
        self.written = 0;
        self.prune();
        Ok(())
    }

    /// Backups of this file, oldest first.
    pub fn backups(&self) -> Vec<PathBuf> {
        let (stem, ext) = split_name(&self.file_name);
        let prefix = format!("{}-", stem);
        let suffix = if ext.is_empty() { String::new() } else { format!(".{}", ext) };
        let mut found: Vec<PathBuf> = match fs::read_dir(&self.dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| n.starts_with(&prefix) && n.ends_with(&suffix))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        found.sort();
        found
    }

    /// Removal failures are ignored; a leftover backup is retried on the
    /// next rotation.
    fn prune(&self) {
        let backups = self.backups();
        let excess = backups.len().saturating_sub(self.max_backups);
        let now = SystemTime::now();
        for (i, path) in backups.iter().enumerate() {
            let expired = fs::metadata(path)
                .and_then(|m| m.modified())
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age > self.max_age)
                .unwrap_or(false);
            if i < excess || expired {
                let _ = fs::remove_file(path);
            }
        }
    }
}

impl Write for SizeRotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Daily [`RollingFileAppender`] with a size cap: once the current day's
/// file would exceed `max_bytes` it is renamed to `stem.DATE.N.ext` and the
/// appender reopens a fresh file for the same day.
///
/// The appender names files by UTC date and keeps at most `max_files` of
/// them, size backups included.
pub struct DateRotatingFile {
    dir: PathBuf,
    stem: String,
    ext: String,
    max_bytes: u64,
    max_files: usize,
    appender: RollingFileAppender,
    day: NaiveDate,
    written: u64,
}

impl DateRotatingFile {
    pub fn open(dir: &Path, file_name: &str, max_bytes: u64, max_files: usize) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let (stem, ext) = split_name(file_name);
        let appender = daily_appender(dir, stem, ext, max_files)?;
        let mut file = DateRotatingFile {
            dir: dir.to_path_buf(),
            stem: stem.to_string(),
            ext: ext.to_string(),
            max_bytes: max_bytes.max(1),
            max_files,
            appender,
            day: Utc::now().date_naive(),
            written: 0,
        };
        file.written = fs::metadata(file.path()).map(|m| m.len()).unwrap_or(0);
        Ok(file)
    }

    /// The file written for the current day.
    pub fn path(&self) -> PathBuf {
        self.dir.join(self.dated_name(None))
    }

    fn dated_name(&self, part: Option<u32>) -> String {
        let mut name = format!("{}.{}", self.stem, self.day.format("%Y-%m-%d"));
        if let Some(part) = part {
            name.push_str(&format!(".{}", part));
        }
        if !self.ext.is_empty() {
            name.push('.');
            name.push_str(&self.ext);
        }
        name
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.appender.flush()?;
        let mut part = 1;
        let backup = loop {
            let candidate = self.dir.join(self.dated_name(Some(part)));
            if !candidate.exists() {
                break candidate;
            }
            part += 1;
        };
        fs::rename(self.path(), backup)?;
        self.appender = daily_appender(&self.dir, &self.stem, &self.ext, self.max_files)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.written = 0;
        Ok(())
    }
}

impl Write for DateRotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let today = Utc::now().date_naive();
        if today != self.day {
            self.day = today;
            self.written = 0;
        }
        if self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.appender.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.appender.flush()
    }
}

fn daily_appender(
    dir: &Path,
    stem: &str,
    ext: &str,
    max_files: usize,
) -> std::result::Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    let mut builder = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(stem)
        .max_log_files(max_files.max(1));
    if !ext.is_empty() {
        builder = builder.filename_suffix(ext);
    }
    builder.build(dir)
}
