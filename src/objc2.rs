//! The modern Objective-C 2 runtime ABI: `__DATA/__objc_classlist`.

use crate::bounded::BoundedName;
use crate::config::Config;
use crate::errors::WalkError;
use crate::image::{ImageHandle, Width, DATA_SEGMENT_NAME, OBJC_CLASS_LIST_SECTION_NAME};
use crate::impl_pod;
use crate::task_memory::TaskMemory;
use crate::visitor::MethodVisitor;

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Class32 {
    isa: u32,
    superclass: u32,
    cache: u32,
    vtable: u32,
    data_rw: u32,
}
impl_pod!(Class32);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Class64 {
    isa: u64,
    superclass: u64,
    cache: u64,
    vtable: u64,
    data_rw: u64,
}
impl_pod!(Class64);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct ClassDataRw32 {
    flags: u32,
    version: u32,
    data_ro: u32,
}
impl_pod!(ClassDataRw32);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct ClassDataRw64 {
    flags: u32,
    version: u32,
    data_ro: u64,
}
impl_pod!(ClassDataRw64);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct ClassDataRo32 {
    flags: u32,
    instance_start: u32,
    instance_size: u32,
    ivar_layout: u32,
    name: u32,
    base_methods: u32,
    base_protocols: u32,
    ivars: u32,
    weak_ivar_layout: u32,
    base_properties: u32,
}
impl_pod!(ClassDataRo32);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct ClassDataRo64 {
    flags: u32,
    instance_start: u32,
    instance_size: u32,
    reserved: u32,
    ivar_layout: u64,
    name: u64,
    base_methods: u64,
    base_protocols: u64,
    ivars: u64,
    weak_ivar_layout: u64,
    base_properties: u64,
}
impl_pod!(ClassDataRo64);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct ListHeader {
    entsize: u32,
    count: u32,
}
impl_pod!(ListHeader);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Method32 {
    name: u32,
    types: u32,
    imp: u32,
}
impl_pod!(Method32);

#[derive(Clone, Copy, Default)]
#[repr(C)]
struct Method64 {
    name: u64,
    types: u64,
    imp: u64,
}
impl_pod!(Method64);

fn read_data_ro<I: ImageHandle>(
    image: &I,
    width: Width,
    class_ptr: u64,
) -> Result<(u64, u64), WalkError> {
    let task = image.task();

    let data_rw_raw = match width {
        Width::Narrow => image.swap32(task.read_value::<Class32>(class_ptr)?.data_rw) as u64,
        Width::Wide => image.swap64(task.read_value::<Class64>(class_ptr)?.data_rw),
    };
    // The low two bits are reserved tag bits: mask before dereferencing.
    let data_rw = data_rw_raw & !0x3;

    let data_ro = match width {
        Width::Narrow => {
            image.swap32(task.read_value::<ClassDataRw32>(data_rw)?.data_ro) as u64
        }
        Width::Wide => image.swap64(task.read_value::<ClassDataRw64>(data_rw)?.data_ro),
    };

    let (name_ptr, base_methods) = match width {
        Width::Narrow => {
            let ro: ClassDataRo32 = task.read_value(data_ro)?;
            (
                image.swap32(ro.name) as u64,
                image.swap32(ro.base_methods) as u64,
            )
        }
        Width::Wide => {
            let ro: ClassDataRo64 = task.read_value(data_ro)?;
            (image.swap64(ro.name), image.swap64(ro.base_methods))
        }
    };

    Ok((name_ptr, base_methods))
}

fn read_method<I: ImageHandle>(
    image: &I,
    width: Width,
    method_addr: u64,
) -> Result<(u64, u64), WalkError> {
    let task = image.task();
    match width {
        Width::Narrow => {
            let m: Method32 = task.read_value(method_addr)?;
            Ok((image.swap32(m.name) as u64, image.swap32(m.imp) as u64))
        }
        Width::Wide => {
            let m: Method64 = task.read_value(method_addr)?;
            Ok((image.swap64(m.name), image.swap64(m.imp)))
        }
    }
}

/// Walks every class pointer in `__DATA/__objc_classlist`, invoking
/// `visitor` once per method.
///
/// Returns [`WalkError::SectionNotFound`] if the image carries no class
/// list section. Supports both the 32-bit and 64-bit ObjC2 ABIs, selected
/// by `image.width()`.
pub fn parse_from_data_section<I: ImageHandle>(
    image: &I,
    config: &Config,
    visitor: &mut impl MethodVisitor,
) -> Result<(), WalkError> {
    let section = image.map_section(DATA_SEGMENT_NAME, OBJC_CLASS_LIST_SECTION_NAME)?;
    let task = image.task();
    let width = image.width();
    let ptr_size = width.pointer_size();

    let class_count = section.record_count(ptr_size);

    for i in 0..class_count {
        let list_slot = section.address + i * ptr_size;
        let class_ptr = match width {
            Width::Narrow => {
                let raw: u32 = task.read_value(list_slot)?;
                image.swap32(raw) as u64
            }
            Width::Wide => {
                let raw: u64 = task.read_value(list_slot)?;
                image.swap64(raw)
            }
        };

        let (name_ptr, base_methods) = read_data_ro(image, width, class_ptr)?;

        let class_name = BoundedName::read(task, name_ptr, config.max_name_len)?;

        if base_methods == 0 {
            log::trace!("class with no methods, skipping");
            continue;
        }

        let header: ListHeader = task.read_value(base_methods)?;
        // Low two bits are reserved flag bits, not part of the stride.
        let entsize = image.swap32(header.entsize) & !0x3;
        let count = image.swap32(header.count);

        let mut cursor = base_methods + std::mem::size_of::<ListHeader>() as u64;
        for _ in 0..count {
            let (method_name_ptr, imp) = read_method(image, width, cursor)?;
            let method_name = BoundedName::read(task, method_name_ptr, config.max_name_len)?;

            visitor.visit(class_name.as_bytes(), method_name.as_bytes(), imp);

            cursor += entsize as u64;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockImage, MockTask};

    fn pod_bytes<T: Copy>(value: T) -> Vec<u8> {
        // SAFETY: test-only helper for our own `#[repr(C)]` fixture structs.
        unsafe {
            std::slice::from_raw_parts(
                (&value as *const T).cast::<u8>(),
                std::mem::size_of::<T>(),
            )
            .to_vec()
        }
    }

    // 64-bit, two classes, one with a tagged `data_rw` pointer.
    #[test]
    fn two_classes_one_tagged() {
        let mut task = MockTask::new();

        let classlist_addr = 0x1000u64;
        let class_a = 0x2000u64;
        let class_b = 0x2100u64;
        let rw_a = 0x3000u64;
        let rw_b = 0x3100u64; // class_b's data_rw will be tagged, masked to this
        let ro_a = 0x4000u64;
        let ro_b = 0x4100u64;
        let name_a = 0x5000u64;
        let name_b = 0x5100u64;
        let methods_a = 0x6000u64;
        let methods_b = 0x6100u64;
        let m_a_name = 0x7000u64;
        let m_b_name = 0x7100u64;

        task.add_region(
            classlist_addr,
            &[class_a.to_le_bytes(), class_b.to_le_bytes()].concat(),
        );

        task.add_region(
            class_a,
            &pod_bytes(Class64 {
                isa: 0,
                superclass: 0,
                cache: 0,
                vtable: 0,
                data_rw: rw_a,
            }),
        );
        // class_b's data_rw has its low 2 reserved bits set; must be masked
        // down to `rw_b` before dereferencing.
        task.add_region(
            class_b,
            &pod_bytes(Class64 {
                isa: 0,
                superclass: 0,
                cache: 0,
                vtable: 0,
                data_rw: rw_b | 0x3,
            }),
        );

        task.add_region(
            rw_a,
            &pod_bytes(ClassDataRw64 {
                flags: 0,
                version: 0,
                data_ro: ro_a,
            }),
        );
        task.add_region(
            rw_b,
            &pod_bytes(ClassDataRw64 {
                flags: 0,
                version: 0,
                data_ro: ro_b,
            }),
        );

        task.add_region(
            ro_a,
            &pod_bytes(ClassDataRo64 {
                flags: 0,
                instance_start: 0,
                instance_size: 0,
                reserved: 0,
                ivar_layout: 0,
                name: name_a,
                base_methods: methods_a,
                base_protocols: 0,
                ivars: 0,
                weak_ivar_layout: 0,
                base_properties: 0,
            }),
        );
        task.add_region(
            ro_b,
            &pod_bytes(ClassDataRo64 {
                flags: 0,
                instance_start: 0,
                instance_size: 0,
                reserved: 0,
                ivar_layout: 0,
                name: name_b,
                base_methods: methods_b,
                base_protocols: 0,
                ivars: 0,
                weak_ivar_layout: 0,
                base_properties: 0,
            }),
        );

        task.add_region(name_a, b"Foo\0");
        task.add_region(name_b, b"Bar\0");

        task.add_region(
            methods_a,
            &pod_bytes(ListHeader {
                entsize: 24,
                count: 1,
            }),
        );
        task.add_region(
            methods_a + std::mem::size_of::<ListHeader>() as u64,
            &pod_bytes(Method64 {
                name: m_a_name,
                types: 0,
                imp: 0xaaaa,
            }),
        );
        task.add_region(m_a_name, b"foo\0");

        task.add_region(
            methods_b,
            &pod_bytes(ListHeader {
                entsize: 24,
                count: 1,
            }),
        );
        task.add_region(
            methods_b + std::mem::size_of::<ListHeader>() as u64,
            &pod_bytes(Method64 {
                name: m_b_name,
                types: 0,
                imp: 0xbbbb,
            }),
        );
        task.add_region(m_b_name, b"bar\0");

        let image = MockImage::objc2(task, classlist_addr, 2 * 8, Width::Wide);

        let mut calls = Vec::new();
        parse_from_data_section(&image, &Config::default(), &mut |c: &[u8], m: &[u8], imp| {
            calls.push((c.to_vec(), m.to_vec(), imp));
        })
        .unwrap();

        assert_eq!(
            calls,
            vec![
                (b"Foo".to_vec(), b"foo".to_vec(), 0xaaaa),
                (b"Bar".to_vec(), b"bar".to_vec(), 0xbbbb),
            ]
        );
    }

    // entsize strictly greater than the natural 24-byte record.
    #[test]
    fn entsize_wider_than_natural_record() {
        let mut task = MockTask::new();

        let classlist_addr = 0x1000u64;
        let class_a = 0x2000u64;
        let rw_a = 0x3000u64;
        let ro_a = 0x4000u64;
        let name_a = 0x5000u64;
        let methods_a = 0x6000u64;
        let m0_name = 0x7000u64;
        let m1_name = 0x7100u64;

        task.add_region(classlist_addr, &class_a.to_le_bytes());
        task.add_region(
            class_a,
            &pod_bytes(Class64 {
                isa: 0,
                superclass: 0,
                cache: 0,
                vtable: 0,
                data_rw: rw_a,
            }),
        );
        task.add_region(
            rw_a,
            &pod_bytes(ClassDataRw64 {
                flags: 0,
                version: 0,
                data_ro: ro_a,
            }),
        );
        task.add_region(
            ro_a,
            &pod_bytes(ClassDataRo64 {
                flags: 0,
                instance_start: 0,
                instance_size: 0,
                reserved: 0,
                ivar_layout: 0,
                name: name_a,
                base_methods: methods_a,
                base_protocols: 0,
                ivars: 0,
                weak_ivar_layout: 0,
                base_properties: 0,
            }),
        );
        task.add_region(name_a, b"Widget\0");

        // entsize is 32, eight bytes wider than the 24-byte name/types/imp
        // triple; the extra 8 bytes per record must be skipped, not read.
        task.add_region(
            methods_a,
            &pod_bytes(ListHeader {
                entsize: 32,
                count: 2,
            }),
        );
        let table = methods_a + std::mem::size_of::<ListHeader>() as u64;
        let mut rec0 = pod_bytes(Method64 {
            name: m0_name,
            types: 0,
            imp: 0x10,
        });
        rec0.extend_from_slice(&[0u8; 8]);
        task.add_region(table, &rec0);

        let mut rec1 = pod_bytes(Method64 {
            name: m1_name,
            types: 0,
            imp: 0x20,
        });
        rec1.extend_from_slice(&[0u8; 8]);
        task.add_region(table + 32, &rec1);

        task.add_region(m0_name, b"a\0");
        task.add_region(m1_name, b"b\0");

        let image = MockImage::objc2(task, classlist_addr, 8, Width::Wide);

        let mut calls = Vec::new();
        parse_from_data_section(&image, &Config::default(), &mut |c: &[u8], m: &[u8], imp| {
            calls.push((c.to_vec(), m.to_vec(), imp));
        })
        .unwrap();

        assert_eq!(
            calls,
            vec![
                (b"Widget".to_vec(), b"a".to_vec(), 0x10),
                (b"Widget".to_vec(), b"b".to_vec(), 0x20),
            ]
        );
    }

    #[test]
    fn null_base_methods_is_skipped_cleanly() {
        let mut task = MockTask::new();

        let classlist_addr = 0x1000u64;
        let class_a = 0x2000u64;
        let rw_a = 0x3000u64;
        let ro_a = 0x4000u64;
        let name_a = 0x5000u64;

        task.add_region(classlist_addr, &class_a.to_le_bytes());
        task.add_region(
            class_a,
            &pod_bytes(Class64 {
                isa: 0,
                superclass: 0,
                cache: 0,
                vtable: 0,
                data_rw: rw_a,
            }),
        );
        task.add_region(
            rw_a,
            &pod_bytes(ClassDataRw64 {
                flags: 0,
                version: 0,
                data_ro: ro_a,
            }),
        );
        task.add_region(
            ro_a,
            &pod_bytes(ClassDataRo64 {
                flags: 0,
                instance_start: 0,
                instance_size: 0,
                reserved: 0,
                ivar_layout: 0,
                name: name_a,
                base_methods: 0,
                base_protocols: 0,
                ivars: 0,
                weak_ivar_layout: 0,
                base_properties: 0,
            }),
        );
        task.add_region(name_a, b"Empty\0");

        let image = MockImage::objc2(task, classlist_addr, 8, Width::Wide);

        let mut calls = Vec::new();
        parse_from_data_section(&image, &Config::default(), &mut |c: &[u8], m: &[u8], imp| {
            calls.push((c.to_vec(), m.to_vec(), imp));
        })
        .unwrap();

        assert!(calls.is_empty());
    }
}
