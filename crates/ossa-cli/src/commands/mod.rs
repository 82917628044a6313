//! CLI command implementations

pub mod conformance;

/// How a command finished, mapped to the process exit code by `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Everything tested conforms (or nothing was tested)
    Success,
    /// At least one manifest failed its profile
    NonConformant,
}
