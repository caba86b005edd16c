use thiserror::Error;

/// Errors produced while walking Objective-C runtime metadata in a Mach-O image.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("section not found")]
    SectionNotFound,
    #[error("no matching method found")]
    NotFound,
    #[error("read of 0x{address:x} landed outside the mapped section")]
    Access { address: u64 },
    #[cfg(target_os = "macos")]
    #[error(transparent)]
    Kernel(#[from] crate::mac::mach::KernelError),
}
