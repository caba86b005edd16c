use crate::config::Config;
use crate::errors::WalkError;
use crate::image::ImageHandle;
use crate::objc1;
use crate::objc2;
use crate::visitor::MethodVisitor;

/// Walks every method defined by every class in `image`, preferring the
/// legacy ObjC1 metadata and falling back to ObjC2 only if the image
/// carries no `__OBJC/__module_info` section at all.
pub fn parse<I: ImageHandle>(
    image: &I,
    config: &Config,
    visitor: &mut impl MethodVisitor,
) -> Result<(), WalkError> {
    match objc1::parse_from_module_info(image, config, visitor) {
        Err(WalkError::SectionNotFound) => {
            log::trace!("no __OBJC/__module_info section, falling back to __objc_classlist");
            objc2::parse_from_data_section(image, config, visitor)
        }
        other => other,
    }
}
