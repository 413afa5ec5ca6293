//! Vector index clients.
//!
//! [`ChromaClient`] talks to an external Chroma server; [`MemoryIndex`] keeps
//! rows in process and is used for local development and tests.

mod chroma;
mod memory;

pub use chroma::ChromaClient;
pub use memory::{MemoryIndex, cosine_distance};
