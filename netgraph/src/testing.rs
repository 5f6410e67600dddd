//! Builders for serialized graphs used across the unit tests.
use std::collections::HashMap;

use crate::{
    deserializer::Deserializer,
    error::Result,
    graph::{Network, NodeId},
    schema::{
        encode_graph, AnyLayer, BindableLayer, Connection, ConstTensorRecord, InputSlotRecord,
        LayerBase, LayerIndex, LayerRecord, OutputSlotRecord, SerializedGraph, TensorInfoRecord,
    },
    tensor::{ConstTensorData, DataType},
};

pub fn info_record(dims: &[u32], data_type: u8) -> TensorInfoRecord {
    TensorInfoRecord {
        dimensions: dims.to_vec(),
        data_type,
        dimensionality: 1,
        ..Default::default()
    }
}

pub fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// A float constant of shape `dims` stored as an int data block.
pub fn const_record<'a>(dims: &[u32], data: &'a [u8]) -> ConstTensorRecord<'a> {
    ConstTensorRecord {
        info: Some(info_record(dims, DataType::Float32.wire_code())),
        data_type: ConstTensorData::IntData.wire_code(),
        data,
    }
}

/// Output slot `slot` of the layer with logical index `layer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pub layer: LayerIndex,
    pub slot: u32,
}

/// Builds a [`SerializedGraph`] layer by layer. Every tensor is float. Logical indices start at
/// `offset`, so they differ from array positions when the offset is not zero.
pub struct GraphFixture<'a> {
    pub graph: SerializedGraph<'a>,
    offset: LayerIndex,
    dims: HashMap<Handle, Vec<u32>>,
}

impl<'a> GraphFixture<'a> {
    pub fn new() -> Self {
        Self::with_index_offset(0)
    }

    pub fn with_index_offset(offset: LayerIndex) -> Self {
        Self {
            graph: SerializedGraph::default(),
            offset,
            dims: HashMap::new(),
        }
    }

    pub fn dims(&self, handle: Handle) -> Vec<u32> {
        self.dims.get(&handle).cloned().unwrap_or_default()
    }

    /// Base of the next layer: it consumes `inputs` and declares one output per entry of
    /// `outputs`.
    pub fn base(&self, name: &str, inputs: &[Handle], outputs: &[&[u32]]) -> LayerBase {
        let index = self.offset + self.graph.layers.len() as LayerIndex;
        LayerBase {
            index,
            name: name.to_string(),
            input_slots: inputs
                .iter()
                .enumerate()
                .map(|(slot, handle)| InputSlotRecord {
                    index: slot as u32,
                    connection: Connection {
                        source_layer_index: handle.layer,
                        output_slot_index: handle.slot,
                    },
                })
                .collect(),
            output_slots: outputs
                .iter()
                .enumerate()
                .map(|(slot, dims)| OutputSlotRecord {
                    index: slot as u32,
                    tensor_info: Some(info_record(dims, DataType::Float32.wire_code())),
                })
                .collect(),
        }
    }

    /// Appends a layer built by `make` from the base described by `inputs` and `outputs`, and
    /// returns handles to its outputs.
    pub fn layer(
        &mut self,
        name: &str,
        inputs: &[Handle],
        outputs: &[&[u32]],
        make: impl FnOnce(LayerBase) -> LayerRecord<'a>,
    ) -> Vec<Handle> {
        let base = self.base(name, inputs, outputs);
        let index = base.index;
        self.graph.layers.push(AnyLayer::new(make(base)));
        outputs
            .iter()
            .enumerate()
            .map(|(slot, dims)| {
                let handle = Handle {
                    layer: index,
                    slot: slot as u32,
                };
                self.dims.insert(handle, dims.to_vec());
                handle
            })
            .collect()
    }

    /// Like [`Self::layer`] for layers with a single output.
    pub fn single(
        &mut self,
        name: &str,
        inputs: &[Handle],
        dims: &[u32],
        make: impl FnOnce(LayerBase) -> LayerRecord<'a>,
    ) -> Handle {
        self.layer(name, inputs, &[dims], make)[0]
    }

    pub fn input(&mut self, name: &str, dims: &[u32]) -> Handle {
        let layer_binding_id = self.graph.input_ids.len() as i32;
        let handle = self.single(name, &[], dims, |base| {
            LayerRecord::Input(BindableLayer {
                base,
                layer_binding_id,
            })
        });
        self.graph.input_ids.push(handle.layer as i32);
        handle
    }

    pub fn output(&mut self, name: &str, source: Handle) {
        let layer_binding_id = self.graph.output_ids.len() as i32;
        let base = self.base(name, &[source], &[]);
        let index = base.index;
        self.graph
            .layers
            .push(AnyLayer::new(LayerRecord::Output(BindableLayer {
                base,
                layer_binding_id,
            })));
        self.graph.output_ids.push(index as i32);
    }

    pub fn add(&mut self, name: &str, a: Handle, b: Handle) -> Handle {
        let dims = self.dims(a);
        self.single(name, &[a, b], &dims, LayerRecord::Addition)
    }

    pub fn encode(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        encode_graph(&self.graph)
    }
}

/// Encodes `fixture` and builds it with `deserializer`.
pub fn build(deserializer: &mut Deserializer, fixture: &GraphFixture<'_>) -> Result<Network> {
    let bytes = fixture.encode().expect("fixture graphs always encode");
    deserializer.build_from_buffer(&bytes)
}

pub fn node_named(network: &Network, name: &str) -> NodeId {
    network
        .nodes()
        .find(|(_, node)| node.name() == name)
        .map(|(id, _)| id)
        .unwrap_or_else(|| panic!("no node named {name}"))
}
