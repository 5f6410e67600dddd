use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    error::{DeserializeError, Result},
    graph::{InputSlotRef, Network, OutputSlotRef},
    schema::LayerIndex,
};

/// Slots registered for one producer layer, keyed by the producer's output slot index.
#[derive(Debug, Default)]
struct Connections {
    output_slots: BTreeMap<u32, OutputSlotRef>,
    input_slots: BTreeMap<u32, Vec<InputSlotRef>>,
}

/// Records which outputs each layer produces and which inputs wait on them, keyed by the
/// producer's logical layer index, until every node exists and they can be wired.
#[derive(Debug, Default)]
pub(crate) struct ConnectionRegistry {
    layers: BTreeMap<LayerIndex, Connections>,
}

impl ConnectionRegistry {
    pub(crate) fn clear(&mut self) {
        self.layers.clear();
    }

    pub(crate) fn register_output(
        &mut self,
        layer_index: LayerIndex,
        slot: u32,
        output: OutputSlotRef,
    ) -> Result<()> {
        let connections = self.layers.entry(layer_index).or_default();
        if connections.output_slots.contains_key(&slot) {
            return Err(DeserializeError::DuplicateOutputRegistration { layer_index, slot });
        }
        connections.output_slots.insert(slot, output);
        Ok(())
    }

    /// Records that `input` consumes output slot `slot` of layer `layer_index`.
    pub(crate) fn register_input(&mut self, layer_index: LayerIndex, slot: u32, input: InputSlotRef) {
        self.layers
            .entry(layer_index)
            .or_default()
            .input_slots
            .entry(slot)
            .or_default()
            .push(input);
    }

    /// Connects every registered consumer to its producer. Consumers are connected in
    /// registration order.
    pub(crate) fn wire(&self, network: &mut Network) -> Result<usize> {
        let mut made = 0;
        for (layer_index, connections) in &self.layers {
            for (slot, consumers) in &connections.input_slots {
                let producer = connections.output_slots.get(slot).ok_or(
                    DeserializeError::DanglingConnection {
                        layer_index: *layer_index,
                        slot: *slot,
                        consumers: consumers.len(),
                    },
                )?;
                for consumer in consumers {
                    network.connect(*producer, *consumer)?;
                    made += 1;
                }
            }
        }
        debug!(connections = made, "wired network");
        Ok(made)
    }
}
