//! Metadata Sidecar
//!
//! `<dump file name>.json` next to the dump, pretty-printed with 2-space indent.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::error::CaptureError;
use super::types::CaptureMetadata;

pub fn sidecar_path(dump: &Path) -> PathBuf {
    let mut name = dump.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".json");
    dump.with_file_name(name)
}

/// Write the sidecar and return its path. Goes through a temp file so a reader
/// never sees a half-written document.
pub fn write_metadata(dump: &Path, metadata: &CaptureMetadata) -> Result<PathBuf, CaptureError> {
    let path = sidecar_path(dump);
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    if let Err(e) = write_and_rename(&tmp, &path, metadata) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    Ok(path)
}

fn write_and_rename(tmp: &Path, path: &Path, metadata: &CaptureMetadata) -> Result<(), CaptureError> {
    {
        let mut writer = BufWriter::new(File::create(tmp)?);
        serde_json::to_writer_pretty(&mut writer, metadata)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    fs::rename(tmp, path)?;
    Ok(())
}

pub fn read_metadata(dump: &Path) -> Result<CaptureMetadata, CaptureError> {
    let content = fs::read_to_string(sidecar_path(dump))?;
    Ok(serde_json::from_str(&content)?)
}

/// Hex SHA-256 of a file, streamed.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
