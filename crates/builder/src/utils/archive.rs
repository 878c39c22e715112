//! Streaming TAR archive of the build workspace

use crate::orchestrator::ExecInput;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tokio_util::io::SyncIoBridge;
use wharf_errors::Error;

/// Size of the in-memory pipe between the archiver and the exec stdin
const PIPE_CAPACITY: usize = 64 * 1024;

/// Directory names that are never transferred
const SKIPPED_DIRS: &[&str] = &[".git"];

/// Archive `workspace` into a pipe
///
/// Returns the read half of the pipe, to be handed to an exec as stdin, and
/// the handle of the blocking task writing into it. The archive is complete
/// once the read half reports EOF. If the read half is dropped early the
/// task ends with a broken pipe error.
#[must_use]
pub fn workspace_tar_stream(workspace: PathBuf) -> (ExecInput, JoinHandle<Result<(), Error>>) {
    let (reader, writer) = tokio::io::duplex(PIPE_CAPACITY);
    let bridge = SyncIoBridge::new(writer);

    let task = tokio::task::spawn_blocking(move || -> Result<(), Error> {
        let mut tar_builder = tar::Builder::new(bridge);
        tar_builder.follow_symlinks(false);

        add_directory_to_tar(&mut tar_builder, &workspace, Path::new(""))?;

        let mut bridge = tar_builder.into_inner()?;
        bridge.flush()?;
        bridge.shutdown()?;
        Ok(())
    });

    (Box::new(reader), task)
}

/// Recursively add directory contents in lexicographic order
fn add_directory_to_tar<W: Write>(
    tar_builder: &mut tar::Builder<W>,
    dir_path: &Path,
    tar_path: &Path,
) -> Result<(), Error> {
    let mut entries = std::fs::read_dir(dir_path)
        .map_err(|e| Error::io_with_path(&e, dir_path))?
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let file_path = entry.path();
        let file_name = entry.file_name();
        let tar_entry_path = tar_path.join(&file_name);
        let metadata = std::fs::symlink_metadata(&file_path)
            .map_err(|e| Error::io_with_path(&e, &file_path))?;

        if metadata.is_dir() {
            if SKIPPED_DIRS.iter().any(|skipped| file_name == *skipped) {
                continue;
            }
            let mut header = entry_header(tar::EntryType::Directory, &metadata);
            header.set_size(0);
            header.set_cksum();
            tar_builder.append_data(&mut header, &tar_entry_path, std::io::empty())?;

            add_directory_to_tar(tar_builder, &file_path, &tar_entry_path)?;
        } else if metadata.is_file() {
            let mut file = std::fs::File::open(&file_path)
                .map_err(|e| Error::io_with_path(&e, &file_path))?;
            let mut header = entry_header(tar::EntryType::Regular, &metadata);
            header.set_size(metadata.len());
            header.set_cksum();
            tar_builder.append_data(&mut header, &tar_entry_path, &mut file)?;
        } else if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&file_path)?;
            let mut header = entry_header(tar::EntryType::Symlink, &metadata);
            header.set_size(0);
            tar_builder.append_link(&mut header, &tar_entry_path, &target)?;
        }
        // Device nodes, fifos and sockets are not part of a workspace
    }

    Ok(())
}

fn entry_header(entry_type: tar::EntryType, metadata: &std::fs::Metadata) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(normalize_file_permissions(metadata));
    header.set_mtime(modified_seconds(metadata));
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn modified_seconds(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
        .map_or(0, |elapsed| elapsed.as_secs())
}

/// Normalize permissions so the extracted tree does not depend on the umask
fn normalize_file_permissions(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    if metadata.is_dir() {
        0o755
    } else if metadata.file_type().is_symlink() {
        0o777
    } else if metadata.permissions().mode() & 0o111 != 0 {
        0o755
    } else {
        0o644
    }
}
