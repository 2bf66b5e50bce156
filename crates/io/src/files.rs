use crate::errors::{PcpeIoError, PcpeIoResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub fn file_size(path: impl AsRef<Path>) -> PcpeIoResult<u64> {
    let path = path.as_ref();
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|source| PcpeIoError::Open {
            path: path.to_path_buf(),
            source,
        })
}

/// Missing and zero bytes files are treated alike: they contribute nothing
pub fn is_non_empty_file(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path.as_ref())
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

pub fn create_dir_all(path: impl AsRef<Path>) -> PcpeIoResult<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(|source| PcpeIoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub fn remove_file_if_exists(path: impl AsRef<Path>) -> PcpeIoResult<()> {
    let path = path.as_ref();
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(PcpeIoError::Write {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// `<dir>/<prefix>.<index>`
pub fn stage_file_name(dir: impl AsRef<Path>, prefix: &str, index: usize) -> PathBuf {
    dir.as_ref().join(prefix).with_extension(index.to_string())
}

/// `<dir>/<prefix>_<set>.<index>`
pub fn set_file_name(dir: impl AsRef<Path>, prefix: &str, set: &str, index: usize) -> PathBuf {
    stage_file_name(dir, &format!("{}_{}", prefix, set), index)
}

/// `<path>_<index>`, used for the parts of a split file
pub fn part_file_name(path: impl AsRef<Path>, index: usize) -> PathBuf {
    let mut name = OsString::from(path.as_ref().as_os_str());
    name.push(format!("_{}", index));
    PathBuf::from(name)
}
