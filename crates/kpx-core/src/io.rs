//! Serialization helpers for group trees and database files.
//!
//! JSON and CBOR read/write utilities with extension-based auto-detection.
//! Unknown/missing extensions are rejected for reads and default to JSON
//! for writes.
//!
//! Database files are the raw KDB header followed by the body: encrypted
//! for [`read_db`]/[`write_db`], plaintext for [`read_plain_db`]/[`write_plain_db`].
//! Both writers replace an existing file through [`save_replacing`], and
//! `<file>.lock` marks a database as in use.

use crate::body::{open, seal};
use crate::crypto;
use crate::header::{Header, HEADER_SIZE};
use crate::root::Root;
use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Ensure the parent directory for a file exists (no-op if none).
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating parent directory {}", dir.display()))?;
        }
    }
    Ok(())
}

fn ext_lower(p: &Path) -> Option<String> {
    p.extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
}

/// Read a tree from **JSON**.
pub fn read_root_json<P: AsRef<Path>>(path: P) -> Result<Root> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| "deserialize JSON group tree")
}

/// Write a tree to **JSON** (pretty).
pub fn write_root_json<P: AsRef<Path>>(path: P, root: &Root) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, root).with_context(|| "serialize JSON group tree")?;
    w.flush()?;
    Ok(())
}

/// Read a tree from **CBOR**.
pub fn read_root_cbor<P: AsRef<Path>>(path: P) -> Result<Root> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    ciborium::de::from_reader(BufReader::new(f)).with_context(|| "deserialize CBOR group tree")
}

/// Write a tree to **CBOR**.
pub fn write_root_cbor<P: AsRef<Path>>(path: P, root: &Root) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    ciborium::ser::into_writer(root, &mut w).with_context(|| "serialize CBOR group tree")?;
    w.flush()?;
    Ok(())
}

/// Auto-detect read by extension `.json` / `.cbor` (case-insensitive).
pub fn read_root_auto<P: AsRef<Path>>(path: P) -> Result<Root> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("json") => read_root_json(path),
        Some("cbor") => read_root_cbor(path),
        Some(other) => Err(anyhow!(
            "unsupported tree extension: {other} (supported: .json, .cbor)"
        )),
        None => Err(anyhow!("path has no extension (expected .json or .cbor)")),
    }
}

/// Auto-detect write (defaults to **JSON** if unknown or missing).
pub fn write_root_auto<P: AsRef<Path>>(path: P, root: &Root) -> Result<()> {
    match ext_lower(path.as_ref()).as_deref() {
        Some("cbor") => write_root_cbor(path, root),
        _ => write_root_json(path, root),
    }
}

/// `path` with `.suffix` appended (`db.kdb` -> `db.kdb.bak`).
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    w.write_all(bytes)?;
    w.flush()?;
    Ok(())
}

/// Write `bytes` to `path` without ever leaving a half-written database.
///
/// A new file is written directly. An existing one is replaced in three
/// steps: write `<path>.tmp`, rename `<path>` to `<path>.bak`, rename the
/// temporary file into place. The backup is kept.
pub fn save_replacing<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    let path = path.as_ref();
    ensure_parent_dir(path)?;
    if !path.exists() {
        return write_file(path, bytes);
    }

    let tmp = with_suffix(path, "tmp");
    let bak = with_suffix(path, "bak");
    write_file(&tmp, bytes)?;
    fs::rename(path, &bak)
        .with_context(|| format!("rename {} -> {}", path.display(), bak.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    debug!(path = %path.display(), backup = %bak.display(), "replaced database");
    Ok(())
}

/// Lock file guarding `path`.
#[must_use]
pub fn lock_path<P: AsRef<Path>>(path: P) -> PathBuf {
    with_suffix(path.as_ref(), "lock")
}

/// Whether `path` is locked.
#[must_use]
pub fn is_locked<P: AsRef<Path>>(path: P) -> bool {
    lock_path(path).exists()
}

/// Create the lock file for `path` (no-op if already locked).
pub fn lock<P: AsRef<Path>>(path: P) -> Result<()> {
    let lock = lock_path(path);
    ensure_parent_dir(&lock)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&lock)
        .with_context(|| format!("create lock {}", lock.display()))?;
    Ok(())
}

/// Remove the lock file for `path` (no-op if not locked).
pub fn unlock<P: AsRef<Path>>(path: P) -> Result<()> {
    let lock = lock_path(path);
    if lock.exists() {
        fs::remove_file(&lock).with_context(|| format!("error while unlocking {}", lock.display()))?;
    }
    Ok(())
}

fn split_header(path: &Path, data: &[u8]) -> Result<Header> {
    Header::decode(data).with_context(|| format!("header of {}", path.display()))
}

/// Read and decrypt a `header || encrypted body` database.
pub fn read_db<P: AsRef<Path>>(path: P, password: &str) -> Result<(Header, Root)> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let header = split_header(path, &data)?;
    let key = crypto::final_key(&header, password)?;
    let body = crypto::decrypt(&header, &key, &data[HEADER_SIZE..])
        .with_context(|| format!("body of {}", path.display()))?;
    let root = open(&header, &body).with_context(|| format!("body of {}", path.display()))?;
    debug!(path = %path.display(), groups = header.num_groups, entries = header.num_entries, "read database");
    Ok((header, root))
}

/// Encrypt and save a database. `header` is updated to match the body
/// (counts, hash, fresh seed and IV); the transform seed and rounds are kept.
pub fn write_db<P: AsRef<Path>>(path: P, root: &Root, header: &mut Header, password: &str) -> Result<()> {
    let body = seal(root, header)?;
    let key = crypto::final_key(header, password)?;
    let mut data = header.encode().to_vec();
    data.extend(crypto::encrypt(header, &key, &body)?);
    save_replacing(path, &data)
}

/// Read a plaintext `header || body` file, verifying the contents hash.
pub fn read_plain_db<P: AsRef<Path>>(path: P) -> Result<(Header, Root)> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let header = split_header(path, &data)?;
    let root = open(&header, &data[HEADER_SIZE..])
        .with_context(|| format!("body of {}", path.display()))?;
    debug!(path = %path.display(), groups = header.num_groups, entries = header.num_entries, "read plaintext database");
    Ok((header, root))
}

/// Write a plaintext `header || body` file. `header` is updated to match
/// the body (counts, hash, fresh seed and IV).
pub fn write_plain_db<P: AsRef<Path>>(path: P, root: &Root, header: &mut Header) -> Result<()> {
    let body = seal(root, header)?;
    let mut data = header.encode().to_vec();
    data.extend(body);
    save_replacing(path, &data)
}

/// Read a tree from `.json`, `.cbor`, or (any other extension) a database
/// file: encrypted when `password` is given, plaintext otherwise.
pub fn read_any<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<Root> {
    match (ext_lower(path.as_ref()).as_deref(), password) {
        (Some("json" | "cbor"), _) => read_root_auto(path),
        (_, Some(pw)) => read_db(path, pw).map(|(_, root)| root),
        (_, None) => read_plain_db(path).map(|(_, root)| root),
    }
}
