//! In-memory fixtures standing in for a real macOS target task and image,
//! generalized to several non-contiguous regions: a real process's
//! module-info, class records, and strings are scattered across separate
//! allocations, not packed into one contiguous blob.

use crate::errors::WalkError;
use crate::image::{
    ImageHandle, MappedSection, Width, DATA_SEGMENT_NAME, OBJC_CLASS_LIST_SECTION_NAME,
    OBJC_MODULE_INFO_SECTION_NAME, OBJC_SEGMENT_NAME,
};
use crate::task_memory::TaskMemory;

/// A fake target task backed by a set of disjoint byte-array regions.
#[derive(Default)]
pub struct MockTask {
    regions: Vec<(u64, Vec<u8>)>,
}

impl MockTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a region of remote memory starting at `address`.
    pub fn add_region(&mut self, address: u64, bytes: &[u8]) {
        self.regions.push((address, bytes.to_vec()));
    }
}

impl TaskMemory for MockTask {
    fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), WalkError> {
        for (base, data) in &self.regions {
            if address >= *base {
                let offset = (address - base) as usize;
                if let Some(end) = offset.checked_add(buf.len()) {
                    if end <= data.len() {
                        buf.copy_from_slice(&data[offset..end]);
                        return Ok(());
                    }
                }
            }
        }
        Err(WalkError::Access { address })
    }
}

/// A fake image exposing a configurable subset of the two Objective-C
/// sections, over a [`MockTask`] (or any other `TaskMemory`).
pub struct MockImage<T: TaskMemory> {
    task: T,
    objc1: Option<MappedSection>,
    objc2: Option<MappedSection>,
    width: Width,
    swap_bytes: bool,
}

impl<T: TaskMemory> MockImage<T> {
    /// An image exposing only `__OBJC/__module_info`.
    pub fn objc1(task: T, address: u64, length: u64) -> Self {
        Self {
            task,
            objc1: Some(MappedSection { address, length }),
            objc2: None,
            width: Width::Narrow,
            swap_bytes: false,
        }
    }

    /// An image exposing only `__DATA/__objc_classlist`.
    pub fn objc2(task: T, address: u64, length: u64, width: Width) -> Self {
        Self {
            task,
            objc1: None,
            objc2: Some(MappedSection { address, length }),
            width,
            swap_bytes: false,
        }
    }

    /// An image with neither Objective-C section present.
    pub fn no_objc1(task: T) -> Self {
        Self {
            task,
            objc1: None,
            objc2: None,
            width: Width::Narrow,
            swap_bytes: false,
        }
    }

    /// An image whose legacy section is absent but whose ObjC2 class list
    /// is present, for exercising the ObjC1-to-ObjC2 fallback.
    pub fn no_objc1_but_objc2(task: T, address: u64, length: u64, width: Width) -> Self {
        Self {
            task,
            objc1: None,
            objc2: Some(MappedSection { address, length }),
            width,
            swap_bytes: false,
        }
    }

    /// Marks this image as foreign-endian, so every multi-byte field read
    /// through it is byte-reversed.
    pub fn with_swapped_endianness(mut self) -> Self {
        self.swap_bytes = true;
        self
    }
}

impl<T: TaskMemory> ImageHandle for MockImage<T> {
    type Task = T;

    fn task(&self) -> &Self::Task {
        &self.task
    }

    fn map_section(&self, segment: &str, section: &str) -> Result<MappedSection, WalkError> {
        let found = match (segment, section) {
            (s, m) if s == OBJC_SEGMENT_NAME && m == OBJC_MODULE_INFO_SECTION_NAME => self.objc1,
            (s, m) if s == DATA_SEGMENT_NAME && m == OBJC_CLASS_LIST_SECTION_NAME => self.objc2,
            _ => None,
        };
        found.ok_or(WalkError::SectionNotFound)
    }

    fn width(&self) -> Width {
        self.width
    }

    fn swap16(&self, v: u16) -> u16 {
        if self.swap_bytes {
            v.swap_bytes()
        } else {
            v
        }
    }

    fn swap32(&self, v: u32) -> u32 {
        if self.swap_bytes {
            v.swap_bytes()
        } else {
            v
        }
    }

    fn swap64(&self, v: u64) -> u64 {
        if self.swap_bytes {
            v.swap_bytes()
        } else {
            v
        }
    }
}
