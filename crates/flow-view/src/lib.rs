//! flow-view crate
//!
//! The block viewer: fetches a block's links from the block service, lays
//! the graph out and draws it. Navigation state is an explicit object with
//! injected persistence, and every fetch runs as a cancellable task that a
//! newer request supersedes.

pub mod client;
pub mod error;
pub mod layout;
pub mod session;
pub mod state;

pub use client::{BlockApiClient, RecordSource, DEFAULT_API_URL};
pub use error::ViewError;
pub use layout::{Canvas, FileCanvas, Layout};
pub use session::{ViewEvent, ViewSession};
pub use state::{CursorStore, MemoryCursor, Navigation, SqliteCursor, ViewerState, DEFAULT_BLOCK};
