//! Derivative generation.
//!
//! Four fixed [`DerivativeSpec`]s describe what can be produced: a poster
//! image, an audio access copy, a video access copy and a video mezzanine.
//! A video bundle gets all four; an audio bundle gets the audio access copy
//! and, when it has a still image, the poster. Parameters are constants,
//! never derived from the content, so a given input and [`SPEC_VERSION`]
//! always yield the same output.
//!
//! Output files land in a per-bundle [`WorkArea`] that is removed when the
//! bundle's processing ends, however it ends.

mod error;
mod generator;
mod spec;
mod work_area;

pub use error::{GenerationError, GenerationErrorKind};
pub use generator::DerivativeGenerator;
pub use spec::{ArtifactClass, DerivativeArtifact, DerivativeSpec, SPEC_VERSION};
pub use work_area::WorkArea;
