//! flow-graph crate
//!
//! Turns a block's transaction records into an address graph and lays it
//! out with a force simulation: record decoding, graph construction, the
//! force engine, and the SVG scene the engine redraws on every tick.

pub mod builder;
pub mod record;
pub mod scene;
pub mod simulation;

pub use builder::{BlockGraph, Group, Link, Node};
pub use record::{decode_links, decode_response, DecodeError, TransactionRecord};
pub use scene::{Scene, Viewport};
pub use simulation::{Centering, ForceConfig, Simulation};
