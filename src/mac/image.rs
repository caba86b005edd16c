use crate::errors::WalkError;
use crate::image::{ImageHandle, MappedSection, Width};
use crate::mac::mach::{LoadCommand, LoadCommands, MachHeader, Section64, MH_MAGIC_64};
use crate::mac::task_memory::RemoteTask;
use crate::task_memory::TaskMemory;

fn name_matches(raw: &[u8; 16], name: &str) -> bool {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(16);
    &raw[..end] == name.as_bytes()
}

/// A Mach-O image loaded into a live task, identified by the address of
/// its Mach header.
///
/// Section lookup walks the image's own `LC_SEGMENT_64` load commands
/// rather than caching a table, mirroring this crate's no-state-between-
/// calls design: each `map_section` call costs one extra read of the load
/// commands, which is cheap next to the method-list walk that follows it.
pub struct MachImage {
    task: RemoteTask,
    header_address: u64,
}

impl MachImage {
    pub fn new(task: RemoteTask, header_address: u64) -> Self {
        Self {
            task,
            header_address,
        }
    }

    fn load_commands(&self) -> Result<LoadCommands, WalkError> {
        let header: MachHeader = self.task.read_value(self.header_address)?;
        if header.magic != MH_MAGIC_64 {
            return Err(WalkError::Access {
                address: self.header_address,
            });
        }

        let mut buffer = vec![0u8; header.size_commands as usize];
        self.task.read_exact(
            self.header_address + std::mem::size_of::<MachHeader>() as u64,
            &mut buffer,
        )?;

        Ok(LoadCommands {
            buffer,
            count: header.num_commands,
        })
    }
}

impl ImageHandle for MachImage {
    type Task = RemoteTask;

    fn task(&self) -> &Self::Task {
        &self.task
    }

    fn map_section(&self, segment: &str, section: &str) -> Result<MappedSection, WalkError> {
        let commands = self.load_commands()?;

        for cmd in commands.iter() {
            let LoadCommand::Segment(seg, sections) = cmd;
            if !name_matches(&seg.segment_name, segment) {
                continue;
            }

            let section_size = std::mem::size_of::<Section64>();
            let count = (seg.num_sections as usize).min(sections.len() / section_size);

            for i in 0..count {
                let bytes = &sections[i * section_size..(i + 1) * section_size];
                // SAFETY: `bytes` is exactly `size_of::<Section64>()` long
                // and was copied out of the target task's own load commands.
                let sect = unsafe { &*(bytes.as_ptr().cast::<Section64>()) };

                if name_matches(&sect.section_name, section) {
                    return Ok(MappedSection {
                        address: sect.addr,
                        length: sect.size,
                    });
                }
            }
        }

        Err(WalkError::SectionNotFound)
    }

    fn width(&self) -> Width {
        // This backend only ever maps `MH_MAGIC_64` images (see `load_commands`).
        Width::Wide
    }

    fn swap16(&self, v: u16) -> u16 {
        v
    }

    fn swap32(&self, v: u32) -> u32 {
        v
    }

    fn swap64(&self, v: u64) -> u64 {
        v
    }
}
