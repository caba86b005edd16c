//! Fixed-capacity string storage for names read out of a remote task.
//!
//! A scoped "memory object" acquisition that vends a pointer into task
//! memory without copying (and frees it on every exit path, including
//! early returns) is the usual way to read a name without allocating. This
//! crate takes the simpler route of always copying into a small stack
//! buffer: a `BoundedName` owns its bytes outright, so there is nothing to
//! free and nothing that can outlive the frame that created it.

use crate::errors::WalkError;
use crate::task_memory::TaskMemory;

/// Upper bound on how large a `BoundedName` can ever be, independent of
/// [`crate::config::Config`]. `Config::max_name_len` may request anything
/// up to this cap; requests above it are clamped.
pub const MAX_NAME_LEN: usize = 1024;

/// The default used by [`crate::config::Config::default`].
pub const DEFAULT_MAX_NAME_LEN: usize = MAX_NAME_LEN;

/// A NUL-terminated C string read from remote memory into a fixed-size,
/// non-allocating local buffer.
pub struct BoundedName {
    buf: [u8; MAX_NAME_LEN],
    len: usize,
    truncated: bool,
}

impl BoundedName {
    /// Reads bytes starting at `address` until a NUL terminator is seen or
    /// `cap` bytes have been collected, whichever comes first.
    ///
    /// Reads one byte at a time: in an async-signal context the string's
    /// length isn't known ahead of time, and a speculative bulk read could
    /// cross into an unmapped page.
    pub fn read<T: TaskMemory>(task: &T, address: u64, cap: usize) -> Result<Self, WalkError> {
        let cap = cap.min(MAX_NAME_LEN);
        let mut buf = [0u8; MAX_NAME_LEN];
        let mut len = 0usize;
        let mut truncated = false;
        let mut cursor = address;
        let mut byte = [0u8; 1];

        loop {
            task.read_exact(cursor, &mut byte)?;
            if byte[0] == 0 {
                break;
            }
            if len == cap {
                truncated = true;
                log::trace!("name at 0x{address:x} exceeded the configured cap, truncating");
                break;
            }
            buf[len] = byte[0];
            len += 1;
            cursor += 1;
        }

        Ok(Self {
            buf,
            len,
            truncated,
        })
    }

    /// The name's bytes, excluding the NUL terminator (and excluding
    /// anything past the configured cap, if truncated).
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Whether the string ran past the configured cap and was cut short.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTask;

    #[test]
    fn reads_short_string() {
        let mut task = MockTask::new();
        task.add_region(0x1000, b"hello\0world");
        let name = BoundedName::read(&task, 0x1000, MAX_NAME_LEN).unwrap();
        assert_eq!(name.as_bytes(), b"hello");
        assert!(!name.is_truncated());
    }

    #[test]
    fn truncates_at_cap() {
        let mut task = MockTask::new();
        task.add_region(0x2000, b"abcdef\0");
        let name = BoundedName::read(&task, 0x2000, 3).unwrap();
        assert_eq!(name.as_bytes(), b"abc");
        assert!(name.is_truncated());
    }

    #[test]
    fn propagates_read_failure() {
        let task = MockTask::new();
        let err = BoundedName::read(&task, 0x9999, MAX_NAME_LEN);
        assert!(err.is_err());
    }
}
