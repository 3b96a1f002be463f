/// How inbound offsets that aren't already 64-bit signed integers are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetsCoercion {
    /// Only accept int64 offsets. Anything else fails to unbox.
    Strict,
    /// Copy integer offsets of other widths (and plain host lists of integers)
    /// into a new int64 buffer.
    Materialize,
}

/// Configuration for moving arrays across the host boundary.
#[derive(Debug, Clone)]
pub struct MarshalConfig {
    pub offsets_coercion: OffsetsCoercion,
    /// Validate offsets of every unboxed list-offset array.
    ///
    /// When disabled, unboxing trusts the host to only hand over well formed
    /// layouts. Malformed offsets then surface as errors on access.
    pub validate_offsets: bool,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        MarshalConfig {
            offsets_coercion: OffsetsCoercion::Materialize,
            validate_offsets: true,
        }
    }
}
