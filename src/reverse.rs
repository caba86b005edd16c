use crate::config::Config;
use crate::dispatch::parse;
use crate::errors::WalkError;
use crate::image::ImageHandle;
use crate::visitor::MethodVisitor;

/// Finds the method whose implementation address is the greatest value
/// `<= target`, and invokes `visitor` once for every method sharing that
/// address (tail-merged stubs can make more than one method resolve to the
/// same `imp`).
///
/// Runs two full passes over the image rather than keeping a running
/// candidate list: the nearest-match address can't be known until a pass
/// completes, and a crash-path walker has no heap to stash one aside in.
///
/// `target == 0` is not a meaningful query: every method with `imp == 0`
/// would spuriously qualify as a match, and a recorded best IMP of zero is
/// treated the same as no match at all. Callers should simply not issue it.
pub fn find_method<I: ImageHandle>(
    image: &I,
    config: &Config,
    target: u64,
    visitor: &mut impl MethodVisitor,
) -> Result<(), WalkError> {
    let mut best = 0u64;
    parse(image, config, &mut |_: &[u8], _: &[u8], imp: u64| {
        if imp >= best && imp <= target {
            best = imp;
        }
    })?;

    if best == 0 {
        return Err(WalkError::NotFound);
    }

    parse(image, config, &mut |class_name: &[u8], method_name: &[u8], imp: u64| {
        if imp == best {
            visitor.visit(class_name, method_name, imp);
        }
    })
}
