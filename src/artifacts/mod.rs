//! Artifact namespace and resolver.
//!
//! * [`ArtifactNamespace`] maps `(project, kind)` to a canonical path under
//!   an explicit root directory.
//! * [`ArtifactResolver`] finds existing artifacts from earlier runs, with a
//!   pattern fallback for names that drifted between runs.

pub mod namespace;
pub mod resolver;

pub use namespace::{ArtifactKind, ArtifactNamespace, VOCALS_STEM};
pub use resolver::{ArtifactError, ArtifactResolver};
