/// What a decode does when a constant field holds a different value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstPolicy {
    /// Fail with [`crate::Error::InvalidFieldValue`].
    #[default]
    Reject,
    /// Keep the observed value and log it.
    Accept,
}

/// What the registry does when more than one candidate matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmbiguityPolicy {
    /// Fail with [`crate::Error::AmbiguousSchema`].
    #[default]
    Reject,
    /// Use the first registered candidate and log a warning.
    FirstRegistered,
}

/// Knobs for one decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub const_policy: ConstPolicy,
    /// Deepest box nesting accepted before giving up.
    pub max_depth: usize,
    /// Largest element count accepted for an array whose elements occupy
    /// no bytes, such as `senc` samples without IVs or subsamples.
    pub max_empty_elements: u64,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            const_policy: ConstPolicy::Reject,
            max_depth: 64,
            max_empty_elements: 1 << 16,
        }
    }
}

impl DecodeOptions {
    pub fn with_const_policy(mut self, policy: ConstPolicy) -> Self {
        self.const_policy = policy;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_empty_elements(mut self, limit: u64) -> Self {
        self.max_empty_elements = limit;
        self
    }
}
