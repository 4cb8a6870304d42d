//! Batch bundle extraction.
//!
//! The upload is staged to a file under the destination, its type is
//! detected by content sniffing (never by filename), and the staging
//! file is removed on every outcome.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::errors::{PipelineError, PipelineResult};

const STAGING_NAME: &str = ".upload.staging";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const USTAR_MAGIC: &[u8] = b"ustar";
const USTAR_OFFSET: u64 = 257;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Zip,
    TarGz,
    Tar,
}

/// Unpack a zip / tar / tar.gz upload into `dest` and return the
/// top-level case directories, sorted by name.
///
/// The sort makes "discovery order" deterministic; OS directory
/// iteration order is not. Unsupported or malformed content fails
/// with [`PipelineError::InvalidInput`].
pub fn extract(mut upload: impl Read, dest: &Path) -> PipelineResult<Vec<PathBuf>> {
    fs::create_dir_all(dest).map_err(|e| PipelineError::io("creating extraction dir", e))?;

    let staging = dest.join(STAGING_NAME);
    let result = stage_and_unpack(&mut upload, &staging, dest);

    if let Err(e) = fs::remove_file(&staging) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(path = %staging.display(), error = %e, "failed to remove staged upload");
        }
    }

    result?;
    case_dirs(dest)
}

fn stage_and_unpack(upload: &mut impl Read, staging: &Path, dest: &Path) -> PipelineResult<()> {
    let mut file =
        File::create(staging).map_err(|e| PipelineError::io("staging uploaded bundle", e))?;
    io::copy(upload, &mut file).map_err(|e| PipelineError::io("staging uploaded bundle", e))?;
    drop(file);

    match sniff(staging)? {
        ArchiveKind::Zip => {
            let file =
                File::open(staging).map_err(|e| PipelineError::io("opening staged bundle", e))?;
            // The magic only proves the first two bytes; a truncated
            // or corrupt upload still fails the central-directory
            // parse and stays in the bad-request class.
            let mut archive = zip::ZipArchive::new(file)
                .map_err(|e| PipelineError::invalid_input(format!("malformed zip bundle: {e}")))?;
            archive
                .extract(dest)
                .map_err(|e| PipelineError::archive("extracting zip bundle", e))?;
        }
        ArchiveKind::TarGz => {
            let file =
                File::open(staging).map_err(|e| PipelineError::io("opening staged bundle", e))?;
            // Any gzip stream matches the magic, including a stray
            // `.nii.gz` volume uploaded as a bundle; the unpack is
            // what proves it wraps a tar.
            tar::Archive::new(GzDecoder::new(file))
                .unpack(dest)
                .map_err(|e| {
                    PipelineError::invalid_input(format!(
                        "gzip bundle does not contain a valid tar archive: {e}"
                    ))
                })?;
        }
        ArchiveKind::Tar => {
            let file =
                File::open(staging).map_err(|e| PipelineError::io("opening staged bundle", e))?;
            tar::Archive::new(file)
                .unpack(dest)
                .map_err(|e| PipelineError::invalid_input(format!("malformed tar bundle: {e}")))?;
        }
    }
    Ok(())
}

/// Detect the archive type from file content.
///
/// Tar detection relies on the ustar magic at offset 257; pre-POSIX
/// tars without it are rejected as unsupported.
fn sniff(path: &Path) -> PipelineResult<ArchiveKind> {
    let mut file = File::open(path).map_err(|e| PipelineError::io("sniffing bundle type", e))?;

    let mut head = [0u8; 4];
    let read = file
        .read(&mut head)
        .map_err(|e| PipelineError::io("sniffing bundle type", e))?;

    if read >= 4 && head[0] == b'P' && head[1] == b'K' {
        return Ok(ArchiveKind::Zip);
    }
    if read >= 2 && head[..2] == GZIP_MAGIC {
        return Ok(ArchiveKind::TarGz);
    }

    let mut magic = [0u8; 5];
    let is_tar = file
        .seek(SeekFrom::Start(USTAR_OFFSET))
        .and_then(|_| file.read(&mut magic))
        .map(|n| n == 5 && magic == *USTAR_MAGIC)
        .unwrap_or(false);
    if is_tar {
        return Ok(ArchiveKind::Tar);
    }

    Err(PipelineError::invalid_input(
        "unsupported archive type; provide .zip or .tar(.gz)",
    ))
}

/// Every top-level directory entry under `dest`, non-recursive.
fn case_dirs(dest: &Path) -> PipelineResult<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dest).map_err(|e| PipelineError::io("listing extracted cases", e))?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use zip::write::SimpleFileOptions;

    use super::*;

    fn zip_bundle(cases: &[&str]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default();
        for case in cases {
            writer.add_directory(format!("{case}/"), options).unwrap();
            writer
                .start_file(format!("{case}/raw.nii.gz"), options)
                .unwrap();
            writer.write_all(b"volume").unwrap();
        }
        writer.finish().unwrap();
        cursor.into_inner()
    }

    fn tar_bundle(cases: &[&str], gzip: bool) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for case in cases {
            let data = b"volume";
            let mut header = tar::Header::new_ustar();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("{case}/raw.nii.gz"), &data[..])
                .unwrap();
        }
        let tar_bytes = builder.into_inner().unwrap();
        if !gzip {
            return tar_bytes;
        }
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn zip_bundle_yields_case_dirs_in_name_order() {
        let tmp = tempfile::tempdir().unwrap();
        let bundle = zip_bundle(&["case_b", "case_a", "case_c"]);

        let dirs = extract(Cursor::new(bundle), tmp.path()).unwrap();
        let names: Vec<_> = dirs
            .iter()
            .map(|d| d.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names, vec!["case_a", "case_b", "case_c"]);
        assert!(!tmp.path().join(STAGING_NAME).exists());
    }

    #[test]
    fn tar_and_tar_gz_are_supported() {
        for gzip in [false, true] {
            let tmp = tempfile::tempdir().unwrap();
            let bundle = tar_bundle(&["case_1", "case_2"], gzip);

            let dirs = extract(Cursor::new(bundle), tmp.path()).unwrap();
            assert_eq!(dirs.len(), 2);
            assert!(dirs[0].join("raw.nii.gz").is_file());
            assert!(!tmp.path().join(STAGING_NAME).exists());
        }
    }

    #[test]
    fn plain_text_is_rejected_and_staging_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let err = extract(Cursor::new(b"not an archive".to_vec()), tmp.path()).unwrap_err();

        assert!(matches!(err, PipelineError::InvalidInput(_)));
        assert!(err.is_input_error());
        assert!(!tmp.path().join(STAGING_NAME).exists());
    }

    #[test]
    fn gzipped_non_tar_is_invalid_input() {
        // A raw `.nii.gz` volume uploaded as a bundle passes the gzip
        // magic check but is no tar archive.
        let tmp = tempfile::tempdir().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"this is a plain gzipped file").unwrap();
        let bundle = encoder.finish().unwrap();

        let err = extract(Cursor::new(bundle), tmp.path()).unwrap_err();
        assert!(err.is_input_error());
        assert!(err.to_string().contains("tar"));
        assert!(!tmp.path().join(STAGING_NAME).exists());
    }

    #[test]
    fn truncated_zip_is_invalid_input() {
        let tmp = tempfile::tempdir().unwrap();
        let mut bundle = zip_bundle(&["case_a"]);
        bundle.truncate(bundle.len() / 2);

        let err = extract(Cursor::new(bundle), tmp.path()).unwrap_err();
        assert!(err.is_input_error());
        assert!(!tmp.path().join(STAGING_NAME).exists());
    }

    #[test]
    fn top_level_files_are_not_cases() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut cursor);
        let options = SimpleFileOptions::default();
        writer.start_file("README.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        writer.add_directory("case_1/", options).unwrap();
        writer.finish().unwrap();

        let dirs = extract(Cursor::new(cursor.into_inner()), tmp.path()).unwrap();
        assert_eq!(dirs.len(), 1);
        assert!(dirs[0].ends_with("case_1"));
    }
}
