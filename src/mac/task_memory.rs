use crate::errors::WalkError;
use crate::mac::mach::{kern_ret, mach_vm_deallocate, mach_vm_read};
use crate::task_memory::TaskMemory;
use mach2::kern_return::kern_return_t;
use mach2::mach_types::task_name_t;
use mach2::message::mach_msg_type_number_t;
use mach2::vm_types::mach_vm_address_t;

/// A live target task, read through `mach_vm_read`.
///
/// `mach_vm_read` maps the requested range into *this* process and hands
/// back a pointer to it; the pointer must be released with
/// `mach_vm_deallocate` once copied, which is what makes each call here
/// bounded and self-contained rather than holding any lasting view into
/// the target's address space.
pub struct RemoteTask {
    task: task_name_t,
}

impl RemoteTask {
    pub fn new(task: task_name_t) -> Self {
        Self { task }
    }
}

impl TaskMemory for RemoteTask {
    fn read_exact(&self, address: u64, buf: &mut [u8]) -> Result<(), WalkError> {
        if buf.is_empty() {
            return Ok(());
        }

        if failspot::failspot!(crate::FailSpotName::TruncatedMethodList) {
            return Err(WalkError::Access { address });
        }

        let mut data_ptr: mach_vm_address_t = 0;
        let mut data_count: mach_msg_type_number_t = 0;

        kern_ret(|| unsafe {
            mach_vm_read(
                self.task,
                address as mach_vm_address_t,
                buf.len() as u64,
                &mut data_ptr,
                &mut data_count,
            ) as kern_return_t
        })
        .map_err(WalkError::from)?;

        // SAFETY: `mach_vm_read` succeeded, so `data_ptr`/`data_count`
        // describe a region mapped into this process for at least
        // `data_count` bytes.
        let result = if (data_count as usize) < buf.len() {
            Err(WalkError::Access { address })
        } else {
            unsafe {
                std::ptr::copy_nonoverlapping(
                    data_ptr as *const u8,
                    buf.as_mut_ptr(),
                    buf.len(),
                );
            }
            Ok(())
        };

        // SAFETY: releasing exactly the region `mach_vm_read` handed back.
        unsafe {
            mach_vm_deallocate(mach2::traps::mach_task_self(), data_ptr, data_count as u64);
        }

        result
    }
}
