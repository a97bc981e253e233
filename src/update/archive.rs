//! Extraction of the tool executable from a release archive.

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use super::UpdateError;
use crate::platform::Platform;

/// Entries shipped alongside the executable that are never extracted.
const IGNORED: &[&str] = &["LICENSE", "README.md"];

/// Extract the executable for `tool` from `archive` into an `extracted/`
/// directory next to it, returning the path of the written file.
///
/// Dispatches on the file extension. Exactly one entry must qualify as the
/// executable.
pub fn unpack(archive: &Path, tool: &str, platform: &Platform) -> Result<PathBuf, UpdateError> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    let out_dir = archive
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("extracted");
    fs::create_dir_all(&out_dir).map_err(|e| UpdateError::fs("create", &out_dir, e))?;

    let matcher = Matcher { tool, platform };
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".gz") {
        unpack_tar_gz(archive, &out_dir, &matcher)
    } else if name.ends_with(".zip") {
        unpack_zip(archive, &out_dir, &matcher)
    } else {
        Err(UpdateError::ArchiveFormat(format!(
            "unsupported archive type: {name}"
        )))
    }
}

struct Matcher<'a> {
    tool: &'a str,
    platform: &'a Platform,
}

impl Matcher<'_> {
    /// Reduce an entry path to its file name if the entry is the executable.
    fn executable_name(&self, entry_path: &Path) -> Option<String> {
        let name = entry_path.file_name()?.to_str()?.to_string();
        if IGNORED.contains(&name.as_str()) || !name.contains(self.tool) {
            return None;
        }
        let qualifies = if self.platform.is_windows() {
            name.to_ascii_lowercase().ends_with(".exe")
        } else {
            !name.contains('.')
        };
        qualifies.then_some(name)
    }
}

fn unpack_tar_gz(archive: &Path, out_dir: &Path, matcher: &Matcher) -> Result<PathBuf, UpdateError> {
    let file = File::open(archive).map_err(|e| UpdateError::fs("open", archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

    let entries = tar
        .entries()
        .map_err(|e| UpdateError::ArchiveFormat(format!("failed to read archive entries: {e}")))?;

    let mut found: Option<PathBuf> = None;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| UpdateError::ArchiveFormat(format!("corrupt archive entry: {e}")))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| UpdateError::ArchiveFormat(format!("invalid path in archive: {e}")))?
            .into_owned();
        let Some(name) = matcher.executable_name(&path) else {
            continue;
        };
        ensure_single(&found, &name)?;

        let mode = header_mode(&entry.header().as_old().mode)?;
        let dest = out_dir.join(&name);
        write_entry(&mut entry, &dest, mode)?;
        found = Some(dest);
    }

    found.ok_or_else(|| missing(matcher))
}

fn unpack_zip(archive: &Path, out_dir: &Path, matcher: &Matcher) -> Result<PathBuf, UpdateError> {
    let file = File::open(archive).map_err(|e| UpdateError::fs("open", archive, e))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| UpdateError::ArchiveFormat(format!("invalid zip archive: {e}")))?;

    let mut found: Option<PathBuf> = None;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| UpdateError::ArchiveFormat(format!("corrupt zip entry {i}: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let Some(path) = entry.enclosed_name() else {
            continue;
        };
        let Some(name) = matcher.executable_name(&path) else {
            continue;
        };
        ensure_single(&found, &name)?;

        let mode = entry.unix_mode().unwrap_or(0o755) & 0o7777;
        let dest = out_dir.join(&name);
        write_entry(&mut entry, &dest, mode)?;
        found = Some(dest);
    }

    found.ok_or_else(|| missing(matcher))
}

fn ensure_single(found: &Option<PathBuf>, name: &str) -> Result<(), UpdateError> {
    match found {
        Some(previous) => Err(UpdateError::ArchiveFormat(format!(
            "archive contains more than one executable: {} and {name}",
            previous.display()
        ))),
        None => Ok(()),
    }
}

fn missing(matcher: &Matcher) -> UpdateError {
    UpdateError::ArchiveFormat(format!(
        "archive does not contain a '{}' executable",
        matcher.tool
    ))
}

/// Parse a raw tar mode field (octal text or GNU base-256) and range-check
/// it into `u32`.
fn header_mode(field: &[u8; 8]) -> Result<u32, UpdateError> {
    let raw: u64 = if field[0] & 0x80 != 0 {
        field[1..]
            .iter()
            .fold(u64::from(field[0] & 0x7f), |acc, b| (acc << 8) | u64::from(*b))
    } else {
        let text = std::str::from_utf8(field)
            .map_err(|_| UpdateError::ArchiveFormat("non-ASCII mode field".to_string()))?;
        let text = text.trim_matches(|c: char| c == '\0' || c == ' ');
        if text.is_empty() {
            0
        } else {
            u64::from_str_radix(text, 8).map_err(|e| {
                UpdateError::ArchiveFormat(format!("invalid mode field '{text}': {e}"))
            })?
        }
    };

    let mode = u32::try_from(raw)
        .map_err(|_| UpdateError::ArchiveFormat(format!("mode {raw:#o} out of range")))?;
    Ok(mode & 0o7777)
}

fn write_entry(reader: &mut impl Read, dest: &Path, mode: u32) -> Result<(), UpdateError> {
    let mut out = File::create(dest).map_err(|e| UpdateError::fs("create", dest, e))?;
    io::copy(reader, &mut out).map_err(|e| UpdateError::fs("write", dest, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dest, fs::Permissions::from_mode(mode))
            .map_err(|e| UpdateError::fs("set permissions on", dest, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
