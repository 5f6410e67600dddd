//! Rebuilds neural network computation graphs from their serialized form.
//!
//! A serialized graph is a flat list of layer records whose slots refer to each other by logical
//! layer index. [`Deserializer`] verifies the buffer, decodes every layer into an
//! [`graph::Operation`], and wires the resulting [`Network`] together.
#[macro_use]
mod wire_enum;

pub mod deserializer;
pub mod error;
pub mod graph;
pub mod schema;
pub mod tensor;

#[cfg(test)]
mod testing;

pub use deserializer::{BindingEntry, BindingPointInfo, Deserializer, DeserializerOptions};
pub use error::{DeserializeError, LayerLocation, Result};
pub use graph::{Network, NodeId};
