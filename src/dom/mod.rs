pub mod document;
pub mod events;
pub mod node;
pub mod snapshot;
