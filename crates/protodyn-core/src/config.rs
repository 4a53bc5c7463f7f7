//! Codec configuration.

/// Default limit on message nesting
pub const DEFAULT_MAX_DEPTH: usize = 100;

/// What the decoder does with field numbers the message does not declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
    /// Fail with `DecodeError::UnknownField`
    #[default]
    Reject,
    /// Consume and discard the field, including well-formed groups
    Skip,
}

/// Configuration for the codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    /// Maximum nesting of messages below the root
    pub max_depth: usize,
    /// Handling of unknown field numbers on decode
    pub unknown_fields: UnknownFieldPolicy,
    /// Pack repeated numeric scalars on encode (enums are always packed)
    pub pack_repeated_scalars: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unknown_fields: UnknownFieldPolicy::Reject,
            pack_repeated_scalars: false,
        }
    }
}

impl CodecConfig {
    /// Creates a new codec config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the unknown field policy
    pub fn unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    /// Sets whether repeated numeric scalars are packed on encode
    pub fn pack_repeated_scalars(mut self, pack: bool) -> Self {
        self.pack_repeated_scalars = pack;
        self
    }
}
