mod inflight;
pub mod node;
pub mod path;
pub mod registry;
pub mod router;

pub use node::{CacheEntry, RootState};
pub use path::VirtualPath;
pub use registry::{EncryptedPathRef, VolumeRegistry};
pub use router::PathRouter;
