//! Archive extraction with entry callbacks
//!
//! Both formats funnel entry names through the same callback shape so the
//! JDK extractor stays identical across zip and tar.gz payloads.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

use crate::error::{LauncherError, Result};

/// Extract a ZIP archive into `dest`, invoking `on_entry` with each entry name.
///
/// Returns entry names in archive order.
pub fn extract_zip<F>(archive_path: &Path, dest: &Path, mut on_entry: F) -> Result<Vec<String>>
where
    F: FnMut(&str),
{
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut names = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_string();
        on_entry(&name);

        let Some(relative) = entry.enclosed_name() else {
            return Err(LauncherError::malformed_archive(format!(
                "entry {name} escapes the extraction directory"
            )));
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            std::io::copy(&mut entry, &mut out)?;
        }
        names.push(name);
    }

    Ok(names)
}

/// Extract a gzip-compressed tar archive into `dest`, invoking `on_entry`
/// with each entry header's path.
///
/// Returns entry names in archive order.
pub fn extract_tar_gz<F>(archive_path: &Path, dest: &Path, mut on_entry: F) -> Result<Vec<String>>
where
    F: FnMut(&str),
{
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let mut names = Vec::new();

    std::fs::create_dir_all(dest)?;
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry
            .path()
            .map_err(|e| LauncherError::malformed_archive(e.to_string()))?
            .to_string_lossy()
            .into_owned();
        on_entry(&name);
        entry.unpack_in(dest)?;
        names.push(name);
    }

    Ok(names)
}

/// Read a single entry out of a ZIP archive without extracting it
pub fn read_zip_entry(archive_path: &Path, entry_name: &str) -> Result<Vec<u8>> {
    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(file)?;
    let mut entry = archive.by_name(entry_name).map_err(|e| {
        LauncherError::malformed_archive(format!(
            "no {entry_name} in {}: {e}",
            archive_path.display()
        ))
    })?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// First path component of the first archive entry.
///
/// JDK archives wrap everything in a single versioned directory; that
/// directory is the new installation root.
pub fn first_top_level(entry_names: &[String]) -> Option<String> {
    let first = entry_names.first()?;
    Path::new(first).components().find_map(|c| match c {
        Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_test_zip(path: &Path) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer.add_directory("jdk-17.0.5+8/", options).unwrap();
        writer
            .start_file("jdk-17.0.5+8/bin/java", options)
            .unwrap();
        writer.write_all(b"#!/bin/true").unwrap();
        writer.start_file("jdk-17.0.5+8/release", options).unwrap();
        writer.write_all(b"JAVA_VERSION=\"17.0.5\"").unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn zip_extraction_reports_entries_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("jdk.zip");
        write_test_zip(&archive);

        let mut seen = Vec::new();
        let names = extract_zip(&archive, dir.path(), |name| seen.push(name.to_string())).unwrap();

        assert_eq!(names, seen);
        assert_eq!(first_top_level(&names).unwrap(), "jdk-17.0.5+8");
        assert!(dir.path().join("jdk-17.0.5+8/bin/java").is_file());
    }

    #[test]
    fn tar_gz_extraction_reports_entries_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("jdk.tar.gz");

        let file = File::create(&archive_path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(4);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "amazon-corretto-17/readme", &b"jdk\n"[..])
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let out = dir.path().join("out");
        let names = extract_tar_gz(&archive_path, &out, |_| {}).unwrap();

        assert_eq!(first_top_level(&names).unwrap(), "amazon-corretto-17");
        assert!(out.join("amazon-corretto-17/readme").is_file());
    }

    #[test]
    fn read_zip_entry_pulls_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("jdk.zip");
        write_test_zip(&archive);

        let bytes = read_zip_entry(&archive, "jdk-17.0.5+8/release").unwrap();
        assert_eq!(bytes, b"JAVA_VERSION=\"17.0.5\"");

        assert!(matches!(
            read_zip_entry(&archive, "version.json"),
            Err(LauncherError::MalformedArchive(_))
        ));
    }
}
