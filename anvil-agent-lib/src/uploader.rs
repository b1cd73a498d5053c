//! Artifact packaging and upload.
//!
//! `Uploader` walks a source path, streams every regular file into a zip
//! archive while computing its MD5 digest, and delivers archive plus
//! checksum manifest to the server as one multipart POST. Failures are
//! classified so operators can tell disk pressure from anything else.

use crate::{Error, Result};
use chrono::Utc;
use md5::{Digest, Md5};
use std::fmt::Write as _;
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Ships build artifacts to the coordination server.
pub struct Uploader {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl Uploader {
    /// Create an uploader that issues requests through the given client
    /// (the mutual-TLS client from bootstrap, in a full deployment).
    pub fn new(http: reqwest::blocking::Client, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    /// Join a destination directory onto the base URL and tag it with the
    /// build id as a query parameter.
    pub fn build_dest_url(&self, dest_dir: &str, build_id: &str) -> Result<String> {
        let mut url = url::Url::parse(&self.base_url)?;
        let path = format!("{}/{}", url.path().trim_end_matches('/'), dest_dir);
        url.set_path(&path);
        url.query_pairs_mut().append_pair("buildId", build_id);
        Ok(url.into())
    }

    /// Package `source` and POST it to `dest_url`.
    ///
    /// `dest` is the path prefix entries take inside the archive; when
    /// `source` is a single file it becomes the entry name itself. The
    /// temporary archive lives only for the duration of this call.
    pub fn upload(&self, source: &Path, dest: &str, dest_url: &str) -> Result<()> {
        let (archive, manifest) = self.zip_source(source, dest)?;
        let archive_path = archive.path().to_path_buf();

        let form = reqwest::blocking::multipart::Form::new()
            .file("zipfile", &archive_path)?
            .part(
                "file_checksum",
                reqwest::blocking::multipart::Part::text(manifest).file_name("checksum_file"),
            );

        debug!("Uploading {} to {}", source.display(), dest_url);
        let resp = self.http.post(dest_url).multipart(form).send()?;

        match resp.status() {
            reqwest::StatusCode::CREATED => {
                info!("Uploaded {}", source.display());
                Ok(())
            }
            reqwest::StatusCode::PAYLOAD_TOO_LARGE => {
                let size = std::fs::metadata(&archive_path).map(|m| m.len()).unwrap_or(0);
                Err(Error::ArtifactTooLarge {
                    source_path: source.display().to_string(),
                    size,
                })
            }
            status => Err(Error::UploadRejected {
                source_path: source.display().to_string(),
                status: status.to_string(),
            }),
        }
    }

    /// Walk `source` into a fresh temporary zip, accumulating the
    /// checksum manifest as entries are written.
    ///
    /// Directories are not archived, only their contained files. The walk
    /// is sorted so the same tree packages identically across runs.
    fn zip_source(&self, source: &Path, dest: &str) -> Result<(NamedTempFile, String)> {
        let archive = tempfile::Builder::new()
            .prefix("artifact-")
            .suffix(".zip")
            .tempfile()?;
        let mut zip = ZipWriter::new(archive.reopen()?);
        let options = SimpleFileOptions::default();

        let mut manifest = format!("# {}\n", Utc::now().to_rfc3339());
        for entry in WalkDir::new(source).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let entry_name = archive_entry_name(source, entry.path(), dest)?;
            let digest = append_file(&mut zip, entry.path(), &entry_name, options)?;
            manifest.push_str(&entry_name);
            manifest.push('=');
            manifest.push_str(&digest);
            manifest.push('\n');
        }
        zip.finish()?;

        Ok((archive, manifest))
    }
}

/// Stream one file into the archive, returning its hex MD5 digest.
///
/// Single pass: each chunk feeds the hasher and the zip entry, so the
/// file is never held in memory whole.
fn append_file<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    path: &Path,
    entry_name: &str,
    options: SimpleFileOptions,
) -> Result<String> {
    let mut file = File::open(path)?;
    zip.start_file(entry_name, options)?;

    let mut hasher = Md5::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        zip.write_all(&buf[..n])?;
    }

    let mut digest = String::with_capacity(32);
    for byte in hasher.finalize() {
        let _ = write!(digest, "{byte:02x}");
    }
    Ok(digest)
}

/// Compute the archive entry name for a file under `source`.
///
/// A single-file source takes `dest` as its entry name verbatim. For a
/// directory source the name is the path relative to `source` (forward
/// slashes, no leading separator), prefixed with `dest/` when `dest` is
/// non-empty.
fn archive_entry_name(source: &Path, path: &Path, dest: &str) -> Result<String> {
    if path == source {
        return Ok(dest.to_string());
    }

    let rel = path
        .strip_prefix(source)
        .map_err(|_| Error::PathOutsideSource {
            path: path.display().to_string(),
            source_path: source.display().to_string(),
        })?;
    let rel = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    if dest.is_empty() {
        Ok(rel)
    } else {
        Ok(format!("{dest}/{rel}"))
    }
}
