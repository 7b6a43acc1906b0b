//! A small, self-contained ext2 volume manager: format-aware enough to mmap a 128 KiB,
//! single-block-group, 1 KiB-block image and mutate it in place — create directories,
//! copy files in, link and symlink, remove, undelete, and check consistency — without
//! going through the kernel's filesystem layer at all.

pub mod alloc;
pub mod blocklist;
pub mod dirent;
pub mod error;
pub mod fsck;
pub mod layout;
pub mod ops;
pub mod path;
pub mod volume;

#[cfg(test)]
mod format;

pub use error::{Error, Result};
pub use volume::Volume;
