pub mod artifact;
pub mod job;

pub use artifact::{mime_type_for, Artifact, ArtifactKind};
pub use job::{JobKey, JobReport, JobRequest, StockTarget, UserImage};
