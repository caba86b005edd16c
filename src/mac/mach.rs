//! Contains various helpers to improve and expand on the bindings provided
//! by `mach2`.

// Just exports all of the mach functions we use into a flat list
pub use mach2::{
    kern_return::{kern_return_t, KERN_SUCCESS},
    vm::{mach_vm_deallocate, mach_vm_read},
};

/// A Mach kernel error.
///
/// See <usr/include/mach/kern_return.h>.
#[derive(thiserror::Error, Debug)]
pub enum KernelError {
    #[error("specified address is not currently valid")]
    InvalidAddress = 1,
    #[error("specified memory is valid, but does not permit the required forms of access")]
    ProtectionFailure = 2,
    #[error("the address range specified is already in use, or no address range of the size specified could be found")]
    NoSpace = 3,
    #[error("the function requested was not applicable to this type of argument, or an argument is invalid")]
    InvalidArgument = 4,
    #[error("the function could not be performed")]
    Failure = 5,
    #[error("system resource could not be allocated to fulfill this request")]
    ResourceShortage = 6,
    #[error("the task in question does not hold receive rights for the port argument")]
    NotReceiver = 7,
    #[error("bogus access restriction")]
    NoAccess = 8,
    #[error(
        "during a page fault, the target address refers to a memory object that has been destroyed"
    )]
    MemoryFailure = 9,
    #[error(
        "during a page fault, the memory object indicated that the data could not be returned"
    )]
    MemoryError = 10,
    #[error("a blatant range error")]
    InvalidValue = 18,
    #[error("the provided buffer is of insufficient size for the requested data")]
    InsufficientBufferSize = 52,
    #[error("denied by security policy")]
    Denied = 53,
    #[error("a search or query operation did not return a result")]
    NotFound = 56,
    #[error("unrecognised kernel return code")]
    Other,
}

impl From<kern_return_t> for KernelError {
    fn from(kr: kern_return_t) -> Self {
        use mach2::kern_return::*;

        match kr {
            KERN_INVALID_ADDRESS => Self::InvalidAddress,
            KERN_PROTECTION_FAILURE => Self::ProtectionFailure,
            KERN_NO_SPACE => Self::NoSpace,
            KERN_INVALID_ARGUMENT => Self::InvalidArgument,
            KERN_FAILURE => Self::Failure,
            KERN_RESOURCE_SHORTAGE => Self::ResourceShortage,
            KERN_NOT_RECEIVER => Self::NotReceiver,
            KERN_NO_ACCESS => Self::NoAccess,
            KERN_MEMORY_FAILURE => Self::MemoryFailure,
            KERN_MEMORY_ERROR => Self::MemoryError,
            KERN_INVALID_VALUE => Self::InvalidValue,
            52 => Self::InsufficientBufferSize,
            53 => Self::Denied,
            56 => Self::NotFound,
            // This should never happen given a result from a mach call, but
            // in that case we just use `Other` as a catch all.
            _ => Self::Other,
        }
    }
}

/// Wraps a mach call returning a `kern_return_t`, converting anything but
/// `KERN_SUCCESS` into a [`KernelError`].
pub fn kern_ret(f: impl FnOnce() -> kern_return_t) -> Result<(), KernelError> {
    let kr = f();
    if kr == KERN_SUCCESS {
        Ok(())
    } else {
        Err(KernelError::from(kr))
    }
}

// usr/include/mach-o/loader.h, magic number for a 64-bit MachHeader
pub const MH_MAGIC_64: u32 = 0xfeedfacf;
// usr/include/mach-o/loader.h, command to map a segment
pub const LC_SEGMENT_64: u32 = 0x19;

// usr/include/mach-o/loader.h
#[repr(C)]
#[derive(Clone, Copy, Default)]
pub struct MachHeader {
    pub magic: u32,         // mach magic number identifier
    pub cpu_type: i32,      // cpu_type_t cpu specifier
    pub cpu_sub_type: i32,  // cpu_subtype_t machine specifier
    pub file_type: u32,     // type of file
    pub num_commands: u32,  // number of load commands
    pub size_commands: u32, // size of all the load commands
    pub flags: u32,
    __reserved: u32,
}
crate::impl_pod!(MachHeader);

// usr/include/mach-o/loader.h
#[repr(C)]
pub struct LoadCommandBase {
    pub cmd: u32,      // type of load command
    pub cmd_size: u32, // total size of the command in bytes
}

/*
 * The 64-bit segment load command indicates that a part of this file is to be
 * mapped into a 64-bit task's address space. If the 64-bit segment has
 * sections then section_64 structures directly follow the 64-bit segment
 * command and their size is reflected in cmdsize.
 */
#[repr(C)]
pub struct SegmentCommand64 {
    pub cmd: u32,               // type of load command
    pub cmd_size: u32,          // total size of the command in bytes
    pub segment_name: [u8; 16], // string name of the segment
    pub vm_addr: u64,           // memory address the segment is mapped to
    pub vm_size: u64,           // total size of the segment
    pub file_off: u64,          // file offset of the segment
    pub file_size: u64,         // amount mapped from the file
    pub max_prot: i32,          // maximum VM protection
    pub init_prot: i32,         // initial VM protection
    pub num_sections: u32,      // number of sections in the segment
    pub flags: u32,
}

/*
 * A section within a 64-bit segment. One `section_64` directly follows the
 * segment command per section the segment declares.
 */
#[repr(C)]
pub struct Section64 {
    pub section_name: [u8; 16],
    pub segment_name: [u8; 16],
    pub addr: u64,
    pub size: u64,
    pub offset: u32,
    pub align: u32,
    pub reloff: u32,
    pub nreloc: u32,
    pub flags: u32,
    __reserved1: u32,
    __reserved2: u32,
    __reserved3: u32,
}

/// A block of load commands for a particular image, read once into a local
/// buffer from the target task.
pub struct LoadCommands {
    /// The block of memory containing all of the load commands.
    pub buffer: Vec<u8>,
    /// The number of load commands the Mach header claims are present.
    pub count: u32,
}

impl LoadCommands {
    #[inline]
    pub fn iter(&self) -> LoadCommandsIter<'_> {
        LoadCommandsIter {
            buffer: &self.buffer,
            count: self.count,
        }
    }
}

pub enum LoadCommand<'buf> {
    Segment(&'buf SegmentCommand64, &'buf [u8]),
}

pub struct LoadCommandsIter<'buf> {
    buffer: &'buf [u8],
    count: u32,
}

impl<'buf> Iterator for LoadCommandsIter<'buf> {
    type Item = LoadCommand<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        // SAFETY: we're interpreting raw bytes as C structs, staying within
        // `self.buffer`'s bounds and trusting `cmd_size` only up to what
        // remains in the buffer.
        unsafe {
            loop {
                if self.count == 0 || self.buffer.len() < std::mem::size_of::<LoadCommandBase>() {
                    return None;
                }

                let header = &*(self.buffer.as_ptr().cast::<LoadCommandBase>());

                if header.cmd_size as usize > self.buffer.len() {
                    return None;
                }

                let cmd = if header.cmd == LC_SEGMENT_64
                    && (header.cmd_size as usize) >= std::mem::size_of::<SegmentCommand64>()
                {
                    let seg = &*(self.buffer.as_ptr().cast::<SegmentCommand64>());
                    let sections_off = std::mem::size_of::<SegmentCommand64>();
                    let sections = &self.buffer[sections_off..header.cmd_size as usize];
                    Some(LoadCommand::Segment(seg, sections))
                } else {
                    None
                };

                self.count -= 1;
                self.buffer = &self.buffer[header.cmd_size as usize..];

                if let Some(cmd) = cmd {
                    return Some(cmd);
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let sz = self.count as usize;
        (sz, Some(sz))
    }
}
