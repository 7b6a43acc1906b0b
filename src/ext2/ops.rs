//! L6: the five mutating commands — `mkdir`, `cp`, `ln` (hard and symbolic), `rm`, and
//! `restore` — expressed in terms of the lower layers.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::alloc::{alloc_block, alloc_inode, mark_inode_free, try_mark_inode_used};
use crate::blocklist::{append_block, mark_blocks_free_keep_pointers, try_mark_blocks_used_from_pointers};
use crate::dirent::{find, find_gap_entry, init_dir_block, insert, remove_entry, splice_gap_entry};
use crate::error::{Error, Result};
use crate::layout::{RawInode, BLOCK_SIZE, FT_DIR, FT_REG_FILE, FT_SYMLINK, S_IFDIR, S_IFLNK, S_IFREG};
use crate::path::resolve_parent;
use crate::volume::Volume;

/// Returns the directory-entry file-type byte matching `inode`'s mode.
fn file_type_of(inode: &RawInode) -> u8 {
    match inode.file_type() {
        t if t == S_IFDIR => FT_DIR,
        t if t == S_IFLNK => FT_SYMLINK,
        _ => FT_REG_FILE,
    }
}

/// The current time as a 32-bit Unix timestamp, for `i_dtime`. Falls back to zero if
/// the system clock is somehow before the epoch.
fn now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Writes `data` into a freshly allocated inode's block list, one block at a time.
fn write_blocks<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    inode: &mut RawInode,
    data: &[u8],
) -> Result<()> {
    for chunk in data.chunks(BLOCK_SIZE as usize) {
        let b = alloc_block(vol)?;
        append_block(vol, inode, b)?;
        let block = vol.block_mut(b);
        block.fill(0);
        block[..chunk.len()].copy_from_slice(chunk);
    }
    Ok(())
}

/// Creates an empty directory at `path`.
pub fn mkdir<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, path: &str) -> Result<()> {
    let (parent_num, leaf) = resolve_parent(vol, path)?;
    let mut parent = vol.inode(parent_num);
    if find(vol, &parent, leaf).is_some() {
        return Err(Error::Exists);
    }

    let new_num = alloc_inode(vol)?;
    let mut child = RawInode {
        mode: S_IFDIR,
        links_count: 2,
        ..RawInode::default()
    };

    let data_block = alloc_block(vol)?;
    append_block(vol, &mut child, data_block)?;
    vol.set_inode(new_num, &child);
    init_dir_block(vol, data_block, new_num, parent_num);

    insert(vol, parent_num, &mut parent, leaf, new_num, FT_DIR)?;
    parent.links_count += 1;
    vol.set_inode(parent_num, &parent);
    Ok(())
}

/// Copies the host file at `source` into the image at `dest`.
pub fn copy_in<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    source: &Path,
    dest: &str,
) -> Result<()> {
    let data = std::fs::read(source)?;

    let (parent_num, leaf) = resolve_parent(vol, dest)?;
    let mut parent = vol.inode(parent_num);
    if find(vol, &parent, leaf).is_some() {
        return Err(Error::Exists);
    }

    let new_num = alloc_inode(vol)?;
    let mut child = RawInode {
        mode: S_IFREG,
        links_count: 1,
        size_low: data.len() as u32,
        ..RawInode::default()
    };
    vol.set_inode(new_num, &child);
    write_blocks(vol, &mut child, &data)?;
    vol.set_inode(new_num, &child);

    insert(vol, parent_num, &mut parent, leaf, new_num, FT_REG_FILE)?;
    Ok(())
}

/// Creates a hard link at `link_path` naming the same inode as `target_path`.
/// Refuses to hard-link directories.
pub fn hard_link<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    target_path: &str,
    link_path: &str,
) -> Result<()> {
    let target_num = crate::path::resolve(vol, target_path)?;
    let mut target = vol.inode(target_num);
    if target.is_dir() {
        return Err(Error::IsDirectory);
    }

    let (parent_num, leaf) = resolve_parent(vol, link_path)?;
    let mut parent = vol.inode(parent_num);
    if find(vol, &parent, leaf).is_some() {
        return Err(Error::Exists);
    }

    let ft = file_type_of(&target);
    insert(vol, parent_num, &mut parent, leaf, target_num, ft)?;
    target.links_count += 1;
    vol.set_inode(target_num, &target);
    Ok(())
}

/// Creates a symbolic link at `link_path` whose content is `target`, verbatim and
/// unresolved.
pub fn symlink<B: AsRef<[u8]> + AsMut<[u8]>>(
    vol: &mut Volume<B>,
    target: &[u8],
    link_path: &str,
) -> Result<()> {
    let (parent_num, leaf) = resolve_parent(vol, link_path)?;
    let mut parent = vol.inode(parent_num);
    if find(vol, &parent, leaf).is_some() {
        return Err(Error::Exists);
    }

    let new_num = alloc_inode(vol)?;
    let mut child = RawInode {
        mode: S_IFLNK,
        links_count: 1,
        size_low: target.len() as u32,
        ..RawInode::default()
    };
    vol.set_inode(new_num, &child);
    write_blocks(vol, &mut child, target)?;
    vol.set_inode(new_num, &child);

    insert(vol, parent_num, &mut parent, leaf, new_num, FT_SYMLINK)?;
    Ok(())
}

/// Removes the directory entry at `path`, decrementing its inode's link count and,
/// once it drops to zero, freeing the inode and its blocks (preserving their pointers
/// for a later `restore`). The entry itself is spliced out of its parent directory's
/// entry list (absorbed into its predecessor's `rec_len`), so a later path lookup can
/// never resolve it again even if its inode number is reused in the meantime. Refuses
/// directories, matching plain `unlink` semantics.
pub fn remove<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, path: &str) -> Result<()> {
    let (parent_num, leaf) = resolve_parent(vol, path)?;
    let parent = vol.inode(parent_num);
    let located = find(vol, &parent, leaf).ok_or(Error::NotFound)?;
    let inode_num = located.header.inode;

    let mut inode = vol.inode(inode_num);
    if inode.is_dir() {
        return Err(Error::IsDirectory);
    }

    remove_entry(vol, &parent, leaf).ok_or(Error::NotFound)?;

    inode.links_count = inode.links_count.saturating_sub(1);
    if inode.links_count == 0 {
        mark_blocks_free_keep_pointers(vol, &inode);
        inode.dtime = now();
        mark_inode_free(vol, inode_num);
    }
    vol.set_inode(inode_num, &inode);
    Ok(())
}

/// Restores the most recently removed entry named by `path`'s leaf component. Fails
/// with [`Error::NotRecoverable`] if the inode or any of its data blocks has since been
/// handed out to something else — recovering it would otherwise leave two inodes
/// claiming the same storage — matching `restore_inode_bitmap`/`restore_block_bitmap`'s
/// refusal to touch an already-set bit.
pub fn restore<B: AsRef<[u8]> + AsMut<[u8]>>(vol: &mut Volume<B>, path: &str) -> Result<()> {
    let (parent_num, leaf) = resolve_parent(vol, path)?;
    let parent = vol.inode(parent_num);
    let gap = find_gap_entry(vol, &parent, leaf).ok_or(Error::NotRecoverable)?;
    let inode_num = gap.header.inode;

    let mut inode = vol.inode(inode_num);
    if inode.dtime == 0 {
        return Err(Error::NotRecoverable);
    }

    splice_gap_entry(vol, &gap);
    inode.dtime = 0;
    inode.links_count = 1;
    vol.set_inode(inode_num, &inode);

    try_mark_inode_used(vol, inode_num)?;
    try_mark_blocks_used_from_pointers(vol, &inode)?;
    Ok(())
}
