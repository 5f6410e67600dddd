use serde::Serialize;
use tracing::debug;

use super::{layer_position, location, producer_info, Deserializer};
use crate::{
    error::{DeserializeError, Result, SlotKind},
    graph::Operation,
    schema::{LayerIndex, LayerRecord, SerializedGraph},
    tensor::{to_tensor_info, TensorInfo},
};

/// What a caller needs to feed or read a bound tensor.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BindingPointInfo {
    pub binding_id: i32,
    pub tensor_info: TensorInfo,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BindingEntry {
    pub name: String,
    pub info: BindingPointInfo,
}

impl Deserializer {
    /// Finds the record a global input or output id refers to. Depending on the binding scheme
    /// the id is either a logical layer index or the binding id of an input or output layer.
    fn binding_layer_position(
        &self,
        graph: &SerializedGraph<'_>,
        kind: SlotKind,
        id: i32,
    ) -> Result<usize> {
        if self.features.binding_ids_scheme == 0 {
            let index = LayerIndex::try_from(id).map_err(|_| {
                DeserializeError::invalid_parameter(format!("negative {kind} layer index {id}"))
            })?;
            return layer_position(graph, index);
        }
        graph
            .layers
            .iter()
            .position(|layer| match (&layer.layer, kind) {
                (LayerRecord::Input(input), SlotKind::Input) => input.layer_binding_id == id,
                (LayerRecord::Output(output), SlotKind::Output) => output.layer_binding_id == id,
                _ => false,
            })
            .ok_or(DeserializeError::UnknownBindingId {
                kind,
                binding_id: id,
            })
    }

    pub(crate) fn setup_input_layers(&mut self, graph: &SerializedGraph<'_>) -> Result<()> {
        for id in &graph.input_ids {
            let position = self.binding_layer_position(graph, SlotKind::Input, *id)?;
            let entry = self
                .bind_input(graph, position)
                .map_err(|err| err.located(&location(graph, position)))?;
            self.input_bindings.push(entry);
        }
        Ok(())
    }

    pub(crate) fn setup_output_layers(&mut self, graph: &SerializedGraph<'_>) -> Result<()> {
        for id in &graph.output_ids {
            let position = self.binding_layer_position(graph, SlotKind::Output, *id)?;
            let entry = self
                .bind_output(graph, position)
                .map_err(|err| err.located(&location(graph, position)))?;
            self.output_bindings.push(entry);
        }
        Ok(())
    }

    fn bind_input(&mut self, graph: &SerializedGraph<'_>, position: usize) -> Result<BindingEntry> {
        let layer = record!(graph, position, Input);
        let binding_id = layer.layer_binding_id;
        self.add_layer(graph, position, Operation::Input { binding_id })?;
        let tensor_info = to_tensor_info(layer.base.output_slots[0].tensor_info.as_ref())?;
        debug!(name = %layer.base.name, binding_id, "bound input");
        Ok(BindingEntry {
            name: layer.base.name.clone(),
            info: BindingPointInfo {
                binding_id,
                tensor_info,
            },
        })
    }

    /// The descriptor of an output binding is the one of the producer feeding the output layer.
    fn bind_output(&mut self, graph: &SerializedGraph<'_>, position: usize) -> Result<BindingEntry> {
        let layer = record!(graph, position, Output);
        let binding_id = layer.layer_binding_id;
        self.add_layer(graph, position, Operation::Output { binding_id })?;
        let connection = layer.base.input_slots[0].connection;
        let producer = layer_position(graph, connection.source_layer_index)?;
        let tensor_info = producer_info(graph, producer, connection.output_slot_index)?;
        debug!(name = %layer.base.name, binding_id, "bound output");
        Ok(BindingEntry {
            name: layer.base.name.clone(),
            info: BindingPointInfo {
                binding_id,
                tensor_info,
            },
        })
    }

    /// Bindings of the graph inputs of the last successful build, in declaration order.
    pub fn input_bindings(&self) -> &[BindingEntry] {
        &self.input_bindings
    }

    pub fn output_bindings(&self) -> &[BindingEntry] {
        &self.output_bindings
    }

    pub fn resolve_input_binding(&self, name: &str) -> Result<BindingPointInfo> {
        resolve(&self.input_bindings, SlotKind::Input, name)
    }

    pub fn resolve_output_binding(&self, name: &str) -> Result<BindingPointInfo> {
        resolve(&self.output_bindings, SlotKind::Output, name)
    }
}

fn resolve(bindings: &[BindingEntry], kind: SlotKind, name: &str) -> Result<BindingPointInfo> {
    bindings
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.info.clone())
        .ok_or_else(|| DeserializeError::UnknownBindingName {
            kind,
            name: name.to_string(),
        })
}
