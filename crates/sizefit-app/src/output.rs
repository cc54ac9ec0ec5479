// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact placement on disk.
//
// One artifact becomes `<stem>_compressed.pdf`; several become
// `<stem>_parts/<stem>_<ordinal>.pdf`. Everything is written to a temporary
// file or directory next to the destination and renamed into place only once
// all bytes are on disk. Existing outputs are never overwritten.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sizefit_core::error::{Result, SizefitError};
use sizefit_core::{Artifact, CompressionOutcome};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info};

/// Write `outcome` into `output_dir`, returning the paths created in ordinal order.
pub fn place_outcome(
    input: &Path,
    output_dir: &Path,
    outcome: &CompressionOutcome,
) -> Result<Vec<PathBuf>> {
    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| {
            SizefitError::Configuration(format!("cannot name outputs for {}", input.display()))
        })?;
    fs::create_dir_all(output_dir)?;

    match outcome.artifacts.as_slice() {
        [] => Err(SizefitError::Serialization("no artifacts to write".into())),
        [single] => {
            let target = output_dir.join(format!("{stem}_compressed.pdf"));
            place_single(single, &target)?;
            Ok(vec![target])
        }
        parts => place_parts(stem, parts, output_dir),
    }
}

fn place_single(artifact: &Artifact, target: &Path) -> Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(&artifact.bytes)?;
    staged.as_file().sync_all()?;
    staged
        .persist_noclobber(target)
        .map_err(|err| already_exists_or(err.error, target))?;
    info!(path = %target.display(), bytes = artifact.len(), "Output written");
    Ok(())
}

fn place_parts(stem: &str, parts: &[Artifact], output_dir: &Path) -> Result<Vec<PathBuf>> {
    let final_dir = output_dir.join(format!("{stem}_parts"));
    if final_dir.exists() {
        return Err(already_exists(&final_dir));
    }

    let staging = Builder::new().prefix(".sizefit-").tempdir_in(output_dir)?;
    let mut names = Vec::with_capacity(parts.len());
    for artifact in parts {
        let name = format!("{stem}_{}.pdf", artifact.ordinal);
        let mut file = fs::File::create(staging.path().join(&name))?;
        file.write_all(&artifact.bytes)?;
        file.sync_all()?;
        debug!(file = %name, bytes = artifact.len(), "Part staged");
        names.push(name);
    }

    // The staging directory no longer exists after the rename; dropping the
    // guard is then a no-op.
    fs::rename(staging.path(), &final_dir)?;
    info!(dir = %final_dir.display(), parts = parts.len(), "Outputs written");
    Ok(names.into_iter().map(|name| final_dir.join(name)).collect())
}

fn already_exists(path: &Path) -> SizefitError {
    SizefitError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} already exists", path.display()),
    ))
}

fn already_exists_or(err: io::Error, path: &Path) -> SizefitError {
    if err.kind() == io::ErrorKind::AlreadyExists {
        already_exists(path)
    } else {
        SizefitError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(parts: &[&[u8]]) -> CompressionOutcome {
        let artifacts: Vec<Artifact> = parts
            .iter()
            .enumerate()
            .map(|(index, bytes)| Artifact::new(index + 1, index..index + 1, bytes.to_vec()))
            .collect();
        CompressionOutcome {
            page_count: artifacts.len(),
            source_size: 0,
            compressed_size: 0,
            artifacts,
            warnings: Vec::new(),
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn single_artifact_gets_compressed_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let paths = place_outcome(Path::new("/in/brief.pdf"), dir.path(), &outcome(&[b"one"])).unwrap();

        assert_eq!(paths, vec![dir.path().join("brief_compressed.pdf")]);
        assert_eq!(fs::read(&paths[0]).unwrap(), b"one");
        assert_eq!(entries(dir.path()), vec!["brief_compressed.pdf"]);
    }

    #[test]
    fn several_artifacts_go_to_a_parts_directory() {
        let dir = tempfile::tempdir().unwrap();
        let paths = place_outcome(
            Path::new("brief.pdf"),
            dir.path(),
            &outcome(&[b"first", b"second", b"third"]),
        )
        .unwrap();

        let parts = dir.path().join("brief_parts");
        assert_eq!(
            paths,
            vec![
                parts.join("brief_1.pdf"),
                parts.join("brief_2.pdf"),
                parts.join("brief_3.pdf"),
            ]
        );
        assert_eq!(fs::read(&paths[1]).unwrap(), b"second");
        // No staging directory is left behind.
        assert_eq!(entries(dir.path()), vec!["brief_parts"]);
    }

    #[test]
    fn existing_outputs_are_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("brief_compressed.pdf");
        fs::write(&target, b"keep me").unwrap();

        let err = place_outcome(Path::new("brief.pdf"), dir.path(), &outcome(&[b"new"])).unwrap_err();
        assert!(matches!(err, SizefitError::Io(ref io) if io.kind() == io::ErrorKind::AlreadyExists));
        assert_eq!(fs::read(&target).unwrap(), b"keep me");
        assert_eq!(entries(dir.path()), vec!["brief_compressed.pdf"]);
    }

    #[test]
    fn existing_parts_directory_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("brief_parts")).unwrap();

        let err = place_outcome(Path::new("brief.pdf"), dir.path(), &outcome(&[b"a", b"b"]))
            .unwrap_err();
        assert!(matches!(err, SizefitError::Io(_)));
        assert_eq!(entries(dir.path()), vec!["brief_parts"]);
    }

    #[test]
    fn missing_output_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out").join("court");
        let paths = place_outcome(Path::new("brief.pdf"), &nested, &outcome(&[b"x"])).unwrap();
        assert!(paths[0].starts_with(&nested));
    }
}
