//! Gzip report archiver with timestamp-derived, never-overwriting names.

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};
use flate2::{Compression, write::GzEncoder};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

/// Extension of the returned report name.
pub const REPORT_EXTENSION: &str = "json";
/// Extra suffix carried by the file on disk.
pub const COMPRESSED_SUFFIX: &str = "gz";

const STEM_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";
const MAX_NAME_ATTEMPTS: u32 = 10_000;
#[cfg(unix)]
const REPORT_MODE: u32 = 0o644;

/// Filesystem or compression failure while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Reading the payload, compressing, or writing failed.
    #[error("archive io error: {0}")]
    Io(#[from] io::Error),
    /// Every counter suffix for this second is taken.
    #[error("no free archive name for {stem} after {attempts} attempts")]
    NameExhausted {
        /// Timestamp stem.
        stem: String,
        /// Suffixes tried.
        attempts: u32,
    },
}

/// Writes uploaded reports as `<dir>/<YYYY-MM-DD_HH-MM-SS>.json.gz`.
#[derive(Debug, Clone)]
pub struct ReportArchiver {
    dir: PathBuf,
}

impl ReportArchiver {
    /// Uses `dir` as the archive root, creating it if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Compresses `reader` under a name derived from the current local time.
    ///
    /// Returns the report name without the `.gz` suffix.
    pub fn archive<R: Read>(&self, reader: R) -> Result<String, ArchiveError> {
        self.archive_at(reader, Local::now().naive_local())
    }

    /// Like [`ReportArchiver::archive`] with an explicit timestamp.
    ///
    /// The payload is compressed into a temporary file next to the target and
    /// moved into place with a no-clobber rename. When the second-resolution
    /// name is taken, `_1`, `_2`, ... is appended to the stem.
    pub fn archive_at<R: Read>(&self, mut reader: R, at: NaiveDateTime) -> Result<String, ArchiveError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut encoder = GzEncoder::new(tmp.as_file_mut(), Compression::default());
            io::copy(&mut reader, &mut encoder)?;
            encoder.finish()?;
        }
        set_public_read(tmp.as_file())?;

        let stem = at.format(STEM_FORMAT).to_string();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let filename = report_name(&stem, attempt);
            match tmp.persist_noclobber(self.path_for(&filename)) {
                Ok(_) => {
                    debug!(%filename, "report archived");
                    return Ok(filename);
                }
                Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                    tmp = err.file;
                }
                Err(err) => return Err(err.error.into()),
            }
        }

        Err(ArchiveError::NameExhausted {
            stem,
            attempts: MAX_NAME_ATTEMPTS,
        })
    }

    /// On-disk path of an archived report name.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(format!("{filename}.{COMPRESSED_SUFFIX}"))
    }

    /// Removes an archived report.
    pub fn discard(&self, filename: &str) -> Result<(), ArchiveError> {
        fs::remove_file(self.path_for(filename))?;
        Ok(())
    }
}

/// Archived reports are served as static data, so they must be world-readable.
#[cfg(unix)]
fn set_public_read(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(REPORT_MODE))
}

#[cfg(not(unix))]
fn set_public_read(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

fn report_name(stem: &str, attempt: u32) -> String {
    if attempt == 0 {
        format!("{stem}.{REPORT_EXTENSION}")
    } else {
        format!("{stem}_{attempt}.{REPORT_EXTENSION}")
    }
}
