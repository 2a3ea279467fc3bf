use thiserror::Error;

/// Foundational error type shared by every layer below the model builder.
///
/// Higher crates (`pd-model`, `pd-discretize`, `pd-solver`, ...) define their
/// own richer enums and convert into/out of this one with `#[from]`; this
/// type only covers failures that can occur while evaluating the physics
/// kernel or manipulating core numeric types.
#[derive(Debug, Error)]
pub enum PdError {
    #[error("non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("invalid argument for {what}")]
    InvalidArg { what: &'static str },

    #[error("index out of bounds for {what}: index {index}, len {len}")]
    IndexOob {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("invariant violated: {what}")]
    Invariant { what: &'static str },
}
