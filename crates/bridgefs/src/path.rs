use crate::error::{Error, Result};
use std::path::{Component, Path};

/// Returns true if `path` is the filesystem root.
pub fn is_root<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref()
        .components()
        .all(|c| matches!(c, Component::RootDir))
        && path.as_ref().components().next().is_some()
}

/// Rewrite an absolute path into the key form the backends address by.
///
/// The backends behind this adapter reject a leading separator, so the root
/// maps to the empty string and every other path loses its leading `/`.
/// This is presentation only: key identity and path identity stay 1:1, and
/// it must be applied at every backend call site.
pub fn backend_key<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let mut parts = Vec::new();
    let mut saw_root = false;
    for component in path.components() {
        match component {
            Component::RootDir => saw_root = true,
            Component::CurDir => {}
            Component::Normal(name) => match name.to_str() {
                Some(name) => parts.push(name),
                None => return Err(Error::io(path, "path is not valid UTF-8")),
            },
            Component::ParentDir | Component::Prefix(_) => {
                return Err(Error::io(path, "path must be absolute and normalized"));
            }
        }
    }
    if !saw_root {
        return Err(Error::io(path, "path must be absolute"));
    }
    Ok(parts.join("/"))
}
