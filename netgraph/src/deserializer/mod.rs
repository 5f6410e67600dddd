//! Rebuilds a [`Network`] from a serialized graph.
//!
//! A build runs in three phases: every layer that is not a graph input or output is decoded
//! through the dispatch table, then the input and output bindings are created, and finally the
//! connection registry wires every producer to its consumers.
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{DeserializeError, LayerLocation, Result, SlotKind},
    graph::{InputSlotRef, Network, NodeId, Operation, OutputSlotRef},
    schema::{self, FeatureVersions, LayerIndex, LayerType, SerializedGraph},
    tensor::{to_tensor_info, TensorInfo},
};

/// Borrows the payload of the record at `$position`, which must be one of the listed variants.
macro_rules! record {
    ($graph:expr, $position:expr, $($variant:ident)|+) => {
        match &$graph.layers[$position].layer {
            $($crate::schema::LayerRecord::$variant(record))|+ => record,
            other => {
                return Err($crate::error::DeserializeError::MalformedBuffer(format!(
                    "layer #{} holds a {:?} record where {} was expected",
                    $position,
                    other.layer_type(),
                    stringify!($($variant)|+)
                )))
            }
        }
    };
}

mod bindings;
mod connections;
mod dispatch;
mod layers;

use connections::ConnectionRegistry;
use dispatch::LayerParser;

pub use bindings::{BindingEntry, BindingPointInfo};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeserializerOptions {
    /// Reject reshape layers whose declared output shape disagrees with the shape inferred from
    /// their target shape.
    pub strict_shape_check: bool,
    /// Largest buffer [`Deserializer::build_from_reader`] accepts.
    pub max_buffer_size: u64,
}

impl Default for DeserializerOptions {
    fn default() -> Self {
        Self {
            strict_shape_check: true,
            max_buffer_size: 1 << 30,
        }
    }
}

/// Builds networks from serialized graphs. One instance can be reused for any number of builds,
/// one at a time; the bindings of the last successful build stay available for lookups.
pub struct Deserializer {
    options: DeserializerOptions,
    parsers: Vec<Option<LayerParser>>,
    network: Network,
    registry: ConnectionRegistry,
    input_bindings: Vec<BindingEntry>,
    output_bindings: Vec<BindingEntry>,
    features: FeatureVersions,
}

impl Default for Deserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Deserializer {
    pub fn new() -> Self {
        Self::with_options(DeserializerOptions::default())
    }

    pub fn with_options(options: DeserializerOptions) -> Self {
        Self {
            options,
            parsers: dispatch::parser_table(),
            network: Network::new(),
            registry: ConnectionRegistry::default(),
            input_bindings: Vec::new(),
            output_bindings: Vec::new(),
            features: FeatureVersions::default(),
        }
    }

    pub fn options(&self) -> &DeserializerOptions {
        &self.options
    }

    /// Drops everything left over from a previous build.
    pub fn reset(&mut self) {
        self.network = Network::new();
        self.registry.clear();
        self.input_bindings.clear();
        self.output_bindings.clear();
        self.features = FeatureVersions::default();
    }

    /// Verifies `bytes`, decodes every layer and returns the wired network. On failure the
    /// builder is left reset.
    pub fn build_from_buffer(&mut self, bytes: &[u8]) -> Result<Network> {
        self.reset();
        match self.build(bytes) {
            Ok(network) => {
                self.registry.clear();
                Ok(network)
            }
            Err(err) => {
                self.reset();
                Err(err)
            }
        }
    }

    /// Reads `reader` to the end and builds the network it holds.
    pub fn build_from_reader(&mut self, reader: impl Read) -> Result<Network> {
        let limit = self.options.max_buffer_size;
        let mut bytes = Vec::new();
        reader.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > limit {
            self.reset();
            return Err(DeserializeError::MalformedBuffer(format!(
                "serialized graph is larger than the {limit} byte limit"
            )));
        }
        self.build_from_buffer(&bytes)
    }

    fn build(&mut self, bytes: &[u8]) -> Result<Network> {
        let graph = schema::verify(bytes)?;
        self.features = graph.feature_versions.unwrap_or_default();

        for (position, layer) in graph.layers.iter().enumerate() {
            if matches!(
                LayerType::from_wire(layer.layer_type),
                Some(LayerType::Input | LayerType::Output)
            ) {
                continue;
            }
            let location = location(&graph, position);
            debug!(%location, layer_type = layer.layer_type, "decoding layer");
            let parser = dispatch::parser_for(&self.parsers, layer.layer_type);
            parser(self, &graph, position).map_err(|err| err.located(&location))?;
        }

        self.setup_input_layers(&graph)?;
        self.setup_output_layers(&graph)?;
        let connections = self.registry.wire(&mut self.network)?;

        let network = std::mem::take(&mut self.network);
        info!(
            nodes = network.len(),
            connections,
            inputs = self.input_bindings.len(),
            outputs = self.output_bindings.len(),
            "network deserialized"
        );
        Ok(network)
    }

    fn check_slot_count(
        graph: &SerializedGraph<'_>,
        position: usize,
        kind: SlotKind,
        expected: usize,
    ) -> Result<()> {
        let base = graph.layers[position].base();
        let actual = match kind {
            SlotKind::Input => base.input_slots.len(),
            SlotKind::Output => base.output_slots.len(),
        };
        if actual != expected {
            return Err(DeserializeError::Arity {
                kind,
                expected,
                actual,
                location: location(graph, position),
            });
        }
        Ok(())
    }

    /// Checks how many input and output slots the record at `position` declares.
    pub(crate) fn check_arity(
        graph: &SerializedGraph<'_>,
        position: usize,
        inputs: usize,
        outputs: usize,
    ) -> Result<()> {
        Self::check_slot_count(graph, position, SlotKind::Input, inputs)?;
        Self::check_slot_count(graph, position, SlotKind::Output, outputs)
    }

    /// Creates the node for the record at `position`, sets its output descriptors and registers
    /// all its slots.
    pub(crate) fn add_layer(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
        operation: Operation,
    ) -> Result<NodeId> {
        self.add_layer_ignoring(graph, position, operation, &[])
    }

    /// Like [`Self::add_layer`], but the input slots in `ignored` are connected by the caller and
    /// do not appear in the record.
    pub(crate) fn add_layer_ignoring(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
        operation: Operation,
        ignored: &[usize],
    ) -> Result<NodeId> {
        let (inputs, outputs) = operation.slot_counts();
        Self::check_arity(graph, position, inputs.saturating_sub(ignored.len()), outputs)?;
        let node = self
            .network
            .add_node(&graph.layers[position].base().name, operation);
        self.register_output_slots(graph, position, node)?;
        self.register_input_slots(graph, position, node, ignored)?;
        Ok(node)
    }

    fn register_output_slots(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
        node: NodeId,
    ) -> Result<()> {
        let base = graph.layers[position].base();
        for record in &base.output_slots {
            let slot = OutputSlotRef::new(node, record.index as usize);
            let info = to_tensor_info(record.tensor_info.as_ref())?;
            self.network.set_tensor_info(slot, info)?;
            self.registry.register_output(base.index, record.index, slot)?;
        }
        Ok(())
    }

    fn register_input_slots(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
        node: NodeId,
        ignored: &[usize],
    ) -> Result<()> {
        let base = graph.layers[position].base();
        let available = self.node_slot_count(node, SlotKind::Input);
        for record in &base.input_slots {
            let slot = record.index as usize;
            if ignored.contains(&slot) || slot >= available {
                return Err(DeserializeError::InvalidSlot {
                    node,
                    kind: SlotKind::Input,
                    slot,
                });
            }
            let connection = record.connection;
            self.registry.register_input(
                connection.source_layer_index,
                connection.output_slot_index,
                InputSlotRef::new(node, slot),
            );
        }
        Ok(())
    }

    fn node_slot_count(&self, node: NodeId, kind: SlotKind) -> usize {
        self.network.node(node).map_or(0, |node| match kind {
            SlotKind::Input => node.num_inputs(),
            SlotKind::Output => node.num_outputs(),
        })
    }

    /// Descriptors of the tensors feeding the record at `position`, in input slot order.
    pub(crate) fn input_infos(
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<Vec<TensorInfo>> {
        graph.layers[position]
            .base()
            .input_slots
            .iter()
            .map(|slot| {
                let connection = slot.connection;
                let producer = layer_position(graph, connection.source_layer_index)?;
                producer_info(graph, producer, connection.output_slot_index)
            })
            .collect()
    }
}

/// Location of the record at `position`, for error reporting.
pub(crate) fn location(graph: &SerializedGraph<'_>, position: usize) -> LayerLocation {
    LayerLocation::new(position, graph.layers[position].base().name.clone())
}

/// Translates a logical layer index into the position of its record.
pub(crate) fn layer_position(graph: &SerializedGraph<'_>, index: LayerIndex) -> Result<usize> {
    graph
        .layers
        .iter()
        .position(|layer| layer.base().index == index)
        .ok_or(DeserializeError::UnknownLayerIndex(index))
}

/// Descriptor declared on output slot `slot` of the record at `position`.
pub(crate) fn producer_info(
    graph: &SerializedGraph<'_>,
    position: usize,
    slot: u32,
) -> Result<TensorInfo> {
    let base = graph.layers[position].base();
    let record = base
        .output_slots
        .iter()
        .find(|record| record.index == slot)
        .ok_or(DeserializeError::DanglingConnection {
            layer_index: base.index,
            slot,
            consumers: 1,
        })?;
    to_tensor_info(record.tensor_info.as_ref())
}

#[cfg(test)]
mod tests {
    use std::io::{Seek, Write};

    use rstest::rstest;

    use super::*;
    use crate::{
        schema::{AnyLayer, LayerRecord},
        testing::{build, node_named, GraphFixture, Handle},
    };

    /// `in -> add(in, in) -> out`.
    fn self_add(offset: LayerIndex) -> GraphFixture<'static> {
        let mut fixture = GraphFixture::with_index_offset(offset);
        let input = fixture.input("in", &[1, 4]);
        let add = fixture.add("add", input, input);
        fixture.output("out", add);
        fixture
    }

    #[rstest]
    #[case::positions_match(0)]
    #[case::positions_differ(100)]
    fn test_self_add_is_wired(#[case] offset: LayerIndex) -> anyhow::Result<()> {
        let mut deserializer = Deserializer::new();
        let network = build(&mut deserializer, &self_add(offset))?;
        assert_eq!(network.len(), 3);

        let input = node_named(&network, "in");
        let add = node_named(&network, "add");
        let output = node_named(&network, "out");
        let produced = OutputSlotRef::new(input, 0);
        assert_eq!(
            network.consumers_of(produced),
            &[InputSlotRef::new(add, 0), InputSlotRef::new(add, 1)]
        );
        assert_eq!(
            network.producer_of(InputSlotRef::new(output, 0)),
            Some(OutputSlotRef::new(add, 0))
        );
        assert_eq!(network.input_nodes().count(), 1);
        assert_eq!(network.output_nodes().count(), 1);

        let bound = deserializer.resolve_input_binding("in")?;
        assert_eq!(bound.binding_id, 0);
        assert_eq!(bound.tensor_info.shape().dims(), &[1, 4]);
        let bound = deserializer.resolve_output_binding("out")?;
        assert_eq!(bound.binding_id, 0);
        assert_eq!(bound.tensor_info.shape().dims(), &[1, 4]);
        Ok(())
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(5)]
    fn test_one_output_feeds_many_consumers(#[case] consumers: usize) -> anyhow::Result<()> {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[2, 2]);
        for i in 0..consumers {
            let floor = fixture.single(&format!("floor{i}"), &[input], &[2, 2], LayerRecord::Floor);
            fixture.output(&format!("out{i}"), floor);
        }
        let mut deserializer = Deserializer::new();
        let network = build(&mut deserializer, &fixture)?;

        let input = node_named(&network, "in");
        assert_eq!(
            network.consumers_of(OutputSlotRef::new(input, 0)).len(),
            consumers
        );
        assert_eq!(deserializer.output_bindings().len(), consumers);
        for (i, entry) in deserializer.output_bindings().iter().enumerate() {
            assert_eq!(entry.name, format!("out{i}"));
            assert_eq!(entry.info.binding_id, i as i32);
        }
        Ok(())
    }

    #[test]
    fn test_output_binding_takes_producer_slot_info() -> anyhow::Result<()> {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        let gate = fixture.input("gate", &[1]);
        let switched = fixture.layer(
            "switch",
            &[input, gate],
            &[&[1, 4], &[1, 7]],
            LayerRecord::Switch,
        );
        fixture.output("first", switched[0]);
        fixture.output("second", switched[1]);
        let mut deserializer = Deserializer::new();
        build(&mut deserializer, &fixture)?;
        let second = deserializer.resolve_output_binding("second")?;
        assert_eq!(second.tensor_info.shape().dims(), &[1, 7]);
        Ok(())
    }

    #[test]
    fn test_unknown_layer_type_is_unsupported() -> anyhow::Result<()> {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        let base = fixture.base("mystery", &[input], &[&[1, 4]]);
        let mut layer = AnyLayer::new(LayerRecord::Opaque(base));
        layer.layer_type = 200;
        fixture.graph.layers.push(layer);

        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        match err {
            DeserializeError::UnsupportedLayer {
                layer_type,
                location,
            } => {
                assert_eq!(layer_type, 200);
                assert_eq!(location, LayerLocation::new(1, "mystery"));
            }
            other => panic!("unexpected error {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_binary_operation_with_one_input() {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        let add = fixture.single("add", &[input], &[1, 4], LayerRecord::Addition);
        fixture.output("out", add);
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::Arity {
                kind: SlotKind::Input,
                expected: 2,
                actual: 1,
                ..
            }
        ));
        assert_eq!(err.location(), Some(&LayerLocation::new(1, "add")));
    }

    #[test]
    fn test_two_layers_with_same_index() {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        let first = fixture.single("first", &[input], &[1, 4], LayerRecord::Floor);
        fixture.single("second", &[input], &[1, 4], LayerRecord::Floor);
        fixture.output("out", first);
        fixture.graph.layers[2].layer.base_mut().index = first.layer;
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::DuplicateOutputRegistration {
                layer_index: 1,
                slot: 0
            }
        ));
    }

    #[test]
    fn test_consumer_of_missing_output_slot() {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        let ghost = Handle {
            layer: input.layer,
            slot: 3,
        };
        let add = fixture.single("add", &[input, ghost], &[1, 4], LayerRecord::Addition);
        fixture.output("out", add);
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::DanglingConnection {
                layer_index: 0,
                slot: 3,
                consumers: 1
            }
        ));
    }

    #[test]
    fn test_failed_build_leaves_builder_reset() -> anyhow::Result<()> {
        let mut deserializer = Deserializer::new();
        build(&mut deserializer, &self_add(0))?;
        assert_eq!(deserializer.input_bindings().len(), 1);

        assert!(deserializer.build_from_buffer(b"not a graph").is_err());
        assert!(deserializer.input_bindings().is_empty());
        assert!(matches!(
            deserializer.resolve_input_binding("in"),
            Err(DeserializeError::UnknownBindingName {
                kind: SlotKind::Input,
                ..
            })
        ));

        let network = build(&mut deserializer, &self_add(0))?;
        assert_eq!(network.len(), 3);
        assert_eq!(deserializer.output_bindings().len(), 1);
        Ok(())
    }

    #[test]
    fn test_unknown_binding_name() -> anyhow::Result<()> {
        let mut deserializer = Deserializer::new();
        build(&mut deserializer, &self_add(0))?;
        assert!(matches!(
            deserializer.resolve_output_binding("in"),
            Err(DeserializeError::UnknownBindingName {
                kind: SlotKind::Output,
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_global_ids_as_binding_ids() -> anyhow::Result<()> {
        let mut fixture = self_add(40);
        fixture.graph.feature_versions = Some(FeatureVersions {
            binding_ids_scheme: 1,
            ..Default::default()
        });
        fixture.graph.input_ids = vec![0];
        fixture.graph.output_ids = vec![0];
        let mut deserializer = Deserializer::new();
        let network = build(&mut deserializer, &fixture)?;
        assert_eq!(network.len(), 3);
        assert_eq!(deserializer.input_bindings()[0].name, "in");

        fixture.graph.output_ids = vec![5];
        let err = build(&mut deserializer, &fixture).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::UnknownBindingId {
                kind: SlotKind::Output,
                binding_id: 5
            }
        ));
        Ok(())
    }

    #[test]
    fn test_global_ids_as_layer_indices() {
        let mut fixture = self_add(0);
        fixture.graph.input_ids = vec![77];
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(err, DeserializeError::UnknownLayerIndex(77)));

        fixture.graph.input_ids = vec![-1];
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(err, DeserializeError::InvalidParameter { .. }));
    }

    #[test]
    fn test_build_from_file() -> anyhow::Result<()> {
        let bytes = self_add(0).encode()?;
        let mut file = tempfile::tempfile()?;
        file.write_all(&bytes)?;
        file.rewind()?;

        let mut deserializer = Deserializer::new();
        let network = deserializer.build_from_reader(&mut file)?;
        assert_eq!(network.len(), 3);

        file.rewind()?;
        let mut deserializer = Deserializer::with_options(DeserializerOptions {
            max_buffer_size: bytes.len() as u64 - 1,
            ..Default::default()
        });
        assert!(matches!(
            deserializer.build_from_reader(&mut file),
            Err(DeserializeError::MalformedBuffer(_))
        ));
        Ok(())
    }

    #[test]
    fn test_options_fill_in_defaults() -> anyhow::Result<()> {
        let options: DeserializerOptions = serde_json::from_str(r#"{"strict_shape_check":false}"#)?;
        assert!(!options.strict_shape_check);
        assert_eq!(options.max_buffer_size, DeserializerOptions::default().max_buffer_size);
        Ok(())
    }
}
