//! Artifact unpacking
//!
//! Release artifacts are gzip-compressed tarballs on Linux and macOS and zip
//! archives on Windows. Anything without a recognised archive extension is
//! treated as a bare executable.

use flate2::read::GzDecoder;
use log::{debug, info};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::Archive;
use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported archive format: {0}")]
    Unsupported(String),
    #[error("unable to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not extract {}: {source}", archive.display())]
    Archive {
        archive: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read zip archive {}: {source}", archive.display())]
    Zip {
        archive: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("archive entry '{0}' points outside the installation directory")]
    UnsafeEntry(String),
    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// How a downloaded artifact has to be unpacked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    TarGz,
    Tar,
    Zip,
    Raw,
}

impl ArtifactKind {
    pub fn from_file_name(file_name: &str) -> Result<Self, ExtractError> {
        let name = file_name.to_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(ArtifactKind::TarGz)
        } else if name.ends_with(".tar") {
            Ok(ArtifactKind::Tar)
        } else if name.ends_with(".zip") {
            Ok(ArtifactKind::Zip)
        } else if [".bz2", ".xz", ".7z", ".rar", ".zst"]
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            Err(ExtractError::Unsupported(file_name.to_string()))
        } else {
            Ok(ArtifactKind::Raw)
        }
    }
}

/// Unpack `artifact` (downloaded as `file_name`) into `dest`.
///
/// Raw binaries are copied to `dest/<executable_name>`.
pub async fn extract_artifact(
    artifact: &Path,
    file_name: &str,
    dest: &Path,
    executable_name: &str,
) -> Result<ArtifactKind, ExtractError> {
    let kind = ArtifactKind::from_file_name(file_name)?;
    let artifact = artifact.to_path_buf();
    let dest = dest.to_path_buf();
    let executable_name = executable_name.to_string();

    info!("Extracting {} ({:?})", file_name, kind);

    // Decompression and file writes are CPU/IO bound
    tokio::task::spawn_blocking(move || {
        create_dir(&dest)?;
        match kind {
            ArtifactKind::TarGz => {
                let file = open(&artifact)?;
                unpack_tar(GzDecoder::new(file), &artifact, &dest)
            }
            ArtifactKind::Tar => {
                let file = open(&artifact)?;
                unpack_tar(file, &artifact, &dest)
            }
            ArtifactKind::Zip => unpack_zip(&artifact, &dest),
            ArtifactKind::Raw => {
                let target = dest.join(&executable_name);
                fs::copy(&artifact, &target)
                    .map(|_| ())
                    .map_err(|source| ExtractError::Archive {
                        archive: artifact.clone(),
                        source,
                    })
            }
        }
    })
    .await??;

    Ok(kind)
}

fn open(path: &Path) -> Result<File, ExtractError> {
    File::open(path).map_err(|source| ExtractError::Archive {
        archive: path.to_path_buf(),
        source,
    })
}

fn create_dir(path: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(path).map_err(|source| ExtractError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Reject absolute paths and `..` so every entry stays below `dest`.
fn contained(dest: &Path, entry: &Path) -> Result<PathBuf, ExtractError> {
    let escapes = entry
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes {
        return Err(ExtractError::UnsafeEntry(entry.display().to_string()));
    }
    Ok(dest.join(entry))
}

fn unpack_tar<R: Read>(reader: R, archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    let archive_err = |source| ExtractError::Archive {
        archive: archive_path.to_path_buf(),
        source,
    };

    let mut archive = Archive::new(reader);
    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let entry_path = entry.path().map_err(archive_err)?.into_owned();
        let target = contained(dest, &entry_path)?;

        if entry.header().entry_type().is_dir() {
            create_dir(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        debug!("  {}", entry_path.display());
        let unpacked = entry.unpack_in(dest).map_err(archive_err)?;
        if !unpacked {
            return Err(ExtractError::UnsafeEntry(entry_path.display().to_string()));
        }
    }
    Ok(())
}

fn unpack_zip(archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    let zip_err = |source| ExtractError::Zip {
        archive: archive_path.to_path_buf(),
        source,
    };
    let io_err = |source| ExtractError::Archive {
        archive: archive_path.to_path_buf(),
        source,
    };

    let mut archive = ZipArchive::new(open(archive_path)?).map_err(zip_err)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(zip_err)?;
        let entry_path = file
            .enclosed_name()
            .ok_or_else(|| ExtractError::UnsafeEntry(file.name().to_string()))?;
        let target = dest.join(&entry_path);

        if file.is_dir() {
            create_dir(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        debug!("  {}", entry_path.display());
        let mut out = File::create(&target).map_err(io_err)?;
        std::io::copy(&mut file, &mut out).map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                fs::set_permissions(&target, fs::Permissions::from_mode(mode)).map_err(io_err)?;
            }
        }
    }
    Ok(())
}
