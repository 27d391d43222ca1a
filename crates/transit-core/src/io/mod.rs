pub mod artifact;
pub mod photometry;

pub use artifact::ArtifactStore;
pub use photometry::{load_frame, load_frames, parse_table, resolve_inputs};
