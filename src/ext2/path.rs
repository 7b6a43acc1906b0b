//! L5: absolute path resolution.
//!
//! Every command takes absolute paths rooted at the volume's root inode; there is no
//! working directory and no relative lookup.

use crate::dirent::find;
use crate::error::{Error, Result};
use crate::layout::ROOT_INODE;
use crate::volume::Volume;

/// Splits an absolute path into its directory components and final component name.
/// `/` alone yields an empty component list and an empty leaf, meaning "the root
/// itself".
fn split(path: &str) -> Result<(Vec<&[u8]>, &[u8])> {
    if !path.starts_with('/') {
        return Err(Error::NotFound);
    }
    let mut components: Vec<&[u8]> = path
        .split('/')
        .filter(|c| !c.is_empty())
        .map(|c| c.as_bytes())
        .collect();
    let leaf = components.pop().unwrap_or(b"");
    Ok((components, leaf))
}

/// Resolves `path` to an inode number, following each directory component in turn.
/// Returns [`Error::NotFound`] if any component is missing, and [`Error::IsDirectory`]
/// only where callers ask for it via [`resolve_parent`]'s leaf handling — plain
/// `resolve` never itself distinguishes file kinds.
pub fn resolve<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &Volume<B>, path: &str) -> Result<u32> {
    let (components, leaf) = split(path)?;
    let mut current = ROOT_INODE;
    for component in components.into_iter().chain(if leaf.is_empty() {
        None
    } else {
        Some(leaf)
    }) {
        let dir = vol.inode(current);
        if !dir.is_dir() {
            return Err(Error::NotFound);
        }
        let located = find(vol, &dir, component).ok_or(Error::NotFound)?;
        current = located.header.inode;
    }
    Ok(current)
}

/// Resolves the parent directory of `path` and returns `(parent_inode_num, leaf_name)`.
/// The parent must exist and be a directory; the leaf itself need not exist.
pub fn resolve_parent<'a, B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &Volume<B>,
    path: &'a str,
) -> Result<(u32, &'a [u8])> {
    let (components, leaf) = split(path)?;
    if leaf.is_empty() {
        return Err(Error::Exists);
    }
    let mut current = ROOT_INODE;
    for component in components {
        let dir = vol.inode(current);
        if !dir.is_dir() {
            return Err(Error::NotFound);
        }
        let located = find(vol, &dir, component).ok_or(Error::NotFound)?;
        current = located.header.inode;
    }
    let parent = vol.inode(current);
    if !parent.is_dir() {
        return Err(Error::NotFound);
    }
    Ok((current, leaf))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::format_fixture;
    use crate::layout::ROOT_INODE;

    #[test]
    fn root_resolves_to_root_inode() {
        let vol = Volume::new(format_fixture());
        assert_eq!(resolve(&vol, "/").unwrap(), ROOT_INODE);
    }

    #[test]
    fn missing_path_reports_not_found() {
        let vol = Volume::new(format_fixture());
        assert!(matches!(resolve(&vol, "/nope"), Err(Error::NotFound)));
    }

    #[test]
    fn resolve_parent_splits_off_leaf() {
        let vol = Volume::new(format_fixture());
        let (parent, leaf) = resolve_parent(&vol, "/b").unwrap();
        assert_eq!(leaf, b"b");
        assert_eq!(parent, ROOT_INODE);
    }

    #[test]
    fn relative_path_is_rejected() {
        let vol = Volume::new(format_fixture());
        assert!(matches!(resolve(&vol, "a/b"), Err(Error::NotFound)));
    }
}
