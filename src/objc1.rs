//! The legacy Objective-C runtime ABI: `__OBJC/__module_info`.

use crate::bounded::BoundedName;
use crate::config::Config;
use crate::errors::WalkError;
use crate::image::{ImageHandle, OBJC_MODULE_INFO_SECTION_NAME, OBJC_SEGMENT_NAME};
use crate::impl_pod;
use crate::task_memory::TaskMemory;
use crate::visitor::MethodVisitor;

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Module {
    version: u32,
    size: u32,
    name: u32,
    symtab: u32,
}
impl_pod!(Module);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Symtab {
    sel_ref_cnt: u32,
    refs: u32,
    cls_def_count: u16,
    cat_def_count: u16,
}
impl_pod!(Symtab);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Class {
    isa: u32,
    superclass: u32,
    name: u32,
    version: u32,
    info: u32,
    instance_size: u32,
    ivars: u32,
    methods: u32,
    cache: u32,
    protocols: u32,
}
impl_pod!(Class);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct MethodListHeader {
    obsolete: u32,
    count: u32,
}
impl_pod!(MethodListHeader);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Method {
    name: u32,
    types: u32,
    imp: u32,
}
impl_pod!(Method);

/// Walks every module in `__OBJC/__module_info`, invoking `visitor` once
/// per method on every class referenced by every module.
///
/// Returns [`WalkError::SectionNotFound`] if the image carries no legacy
/// module-info section at all; callers that want ObjC1-then-ObjC2 fallback
/// should use [`crate::dispatch::parse`] instead of calling this directly.
pub fn parse_from_module_info<I: ImageHandle>(
    image: &I,
    config: &Config,
    visitor: &mut impl MethodVisitor,
) -> Result<(), WalkError> {
    let section = image.map_section(OBJC_SEGMENT_NAME, OBJC_MODULE_INFO_SECTION_NAME)?;
    let task = image.task();

    let module_count = section.record_count(std::mem::size_of::<Module>() as u64);

    for module_index in 0..module_count {
        let module_addr = section.address + module_index * std::mem::size_of::<Module>() as u64;
        let module: Module = task.read_value(module_addr)?;

        let symtab_ptr = image.swap32(module.symtab) as u64;
        if symtab_ptr == 0 {
            continue;
        }

        let symtab: Symtab = task.read_value(symtab_ptr)?;
        let class_count = image.swap16(symtab.cls_def_count);

        for i in 0..class_count as u64 {
            let cursor = symtab_ptr + std::mem::size_of::<Symtab>() as u64 + i * 4;
            let class_ptr_raw: u32 = task.read_value(cursor)?;
            let class_ptr = image.swap32(class_ptr_raw) as u64;

            let class: Class = task.read_value(class_ptr)?;

            let name_ptr = image.swap32(class.name) as u64;
            let class_name = BoundedName::read(task, name_ptr, config.max_name_len)?;

            let method_list_ptr = image.swap32(class.methods) as u64;
            let header: MethodListHeader = task.read_value(method_list_ptr)?;
            let count = image.swap32(header.count);

            for j in 0..count as u64 {
                let method_addr = method_list_ptr
                    + std::mem::size_of::<MethodListHeader>() as u64
                    + j * std::mem::size_of::<Method>() as u64;
                let method: Method = task.read_value(method_addr)?;

                let method_name_ptr = image.swap32(method.name) as u64;
                let method_name = BoundedName::read(task, method_name_ptr, config.max_name_len)?;

                let imp = image.swap32(method.imp) as u64;

                visitor.visit(class_name.as_bytes(), method_name.as_bytes(), imp);
            }
        }
    }

    Ok(())
}
