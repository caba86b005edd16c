//! An async-signal-safe reader for Objective-C runtime metadata embedded in
//! a loaded Mach-O image.
//!
//! This crate streams `(class name, method name, implementation address)`
//! tuples out of a target task without allocating, locking, or blocking,
//! so it can run inside a crash handler. It understands both the legacy
//! ObjC1 module-info layout and the modern ObjC2 class-list layout, in
//! their 32- and 64-bit forms.
#![allow(clippy::useless_conversion)]

pub mod bounded;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod image;
pub mod objc1;
pub mod objc2;
pub mod reverse;
pub mod task_memory;
pub mod visitor;

pub mod testing;

cfg_if::cfg_if! {
    if #[cfg(target_os = "macos")] {
        pub mod mac;
    }
}

pub use config::Config;
pub use dispatch::parse;
pub use errors::WalkError;
pub use image::{ImageHandle, MappedSection, Width};
pub use objc1::parse_from_module_info;
pub use objc2::parse_from_data_section;
pub use reverse::find_method;
pub use task_memory::TaskMemory;
pub use visitor::MethodVisitor;

failspot::failspot_name! {
    pub enum FailSpotName {
        /// Forces the first remote read issued by the ObjC1/ObjC2 walkers
        /// on the current image to fail, simulating a truncated or
        /// partially-unmapped metadata section.
        TruncatedMethodList,
    }
}
