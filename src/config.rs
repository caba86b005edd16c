/// Runtime tuning knobs for the walker.
///
/// There is exactly one knob today: the cap placed on names read out of the
/// target task, which is what keeps [`crate::bounded::BoundedName`] free of
/// heap allocation.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub max_name_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_name_len: crate::bounded::DEFAULT_MAX_NAME_LEN,
        }
    }
}
