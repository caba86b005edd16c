use crate::errors::WalkError;

/// Bounded, non-blocking access to a target task's address space.
///
/// This is the collaborator the walkers depend on for every byte they read;
/// production code backs it with `mach_vm_read` (see [`crate::mac::task_memory`]),
/// while tests back it with an in-memory fixture (see [`crate::testing`]).
pub trait TaskMemory {
    /// Copies `buf.len()` bytes starting at `address` from the target task.
    ///
    /// Must not block and must not allocate beyond what the caller already
    /// provided in `buf`.
    fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), WalkError>;

    /// Reads a fixed-size, plain-old-data value at `address`.
    fn read_value<V: Pod>(&self, address: u64) -> Result<V, WalkError> {
        let mut value = V::zeroed();
        self.read_exact(address, value.as_bytes_mut())?;
        Ok(value)
    }
}

/// A minimal "plain old data" bound for the fixed-size records the walkers
/// decode. Implemented by hand per struct rather than pulling in a crate,
/// since every record here is a small, manually defined `#[repr(C)]` type.
pub trait Pod: Sized {
    fn zeroed() -> Self;
    fn as_bytes_mut(&mut self) -> &mut [u8];
}

/// Implements [`Pod`] for a `#[repr(C)]` struct made entirely of integer
/// fields, by treating its bytes as opaque storage.
#[macro_export]
macro_rules! impl_pod {
    ($ty:ty) => {
        impl $crate::task_memory::Pod for $ty {
            fn zeroed() -> Self {
                // SAFETY: every field of `$ty` is an integer type, so the
                // all-zeroes bit pattern is a valid value.
                unsafe { std::mem::zeroed() }
            }

            fn as_bytes_mut(&mut self) -> &mut [u8] {
                // SAFETY: `$ty` is `#[repr(C)]` and contains no padding we
                // rely on not to be overwritten; we immediately overwrite
                // every byte from a bounded remote read.
                unsafe {
                    std::slice::from_raw_parts_mut(
                        (self as *mut Self).cast::<u8>(),
                        std::mem::size_of::<Self>(),
                    )
                }
            }
        }
    };
}
