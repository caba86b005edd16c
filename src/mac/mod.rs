#[cfg(target_pointer_width = "32")]
compile_error!("the macOS backend assumes a 64-bit architecture");

pub mod image;
pub mod mach;
pub mod task_memory;

pub use image::MachImage;
pub use task_memory::RemoteTask;
