//! Static single assignment form of goto functions.

pub mod local;
pub mod node;
pub mod odometer;
pub mod store;
pub mod unwind;

pub use local::{LocalSsa, Loop};
pub use node::{Equality, FunctionApplication, NodeId, SsaNode};
pub use odometer::Odometer;
pub use store::SsaStore;
pub use unwind::LoopUnwinder;
