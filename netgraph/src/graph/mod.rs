//! The in-memory computation graph produced by the deserializer.
use serde::Serialize;
use tracing::trace;

use crate::{
    error::{DeserializeError, Result, SlotKind},
    tensor::TensorInfo,
};

pub mod descriptors;
mod operation;

pub use operation::{LstmParams, Operation, QuantizedLstmParams};

pub type NodeId = usize;

/// Refers to output slot `slot` of node `node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct OutputSlotRef {
    pub node: NodeId,
    pub slot: usize,
}

/// Refers to input slot `slot` of node `node`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct InputSlotRef {
    pub node: NodeId,
    pub slot: usize,
}

impl OutputSlotRef {
    pub fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }
}

impl InputSlotRef {
    pub fn new(node: NodeId, slot: usize) -> Self {
        Self { node, slot }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct InputSlot {
    // producer feeding this slot, set once during wiring
    connection: Option<OutputSlotRef>,
}

/// An output slot owns the descriptor of the tensor it produces. It can feed any number of input
/// slots.
#[derive(Clone, Debug, Default, Serialize)]
pub struct OutputSlot {
    tensor_info: Option<TensorInfo>,
    connections: Vec<InputSlotRef>,
}

impl OutputSlot {
    pub fn tensor_info(&self) -> Option<&TensorInfo> {
        self.tensor_info.as_ref()
    }

    pub fn connections(&self) -> &[InputSlotRef] {
        &self.connections
    }
}

impl InputSlot {
    pub fn connection(&self) -> Option<OutputSlotRef> {
        self.connection
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct OperationNode {
    name: String,
    operation: Operation,
    inputs: Vec<InputSlot>,
    outputs: Vec<OutputSlot>,
}

impl OperationNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn inputs(&self) -> &[InputSlot] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputSlot] {
        &self.outputs
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }
}

/// A directed graph of operations. Nodes are only ever added; once created a node can have its
/// output descriptors set and its slots connected.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Network {
    nodes: Vec<OperationNode>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node with as many slots as `operation` requires.
    pub fn add_node(&mut self, name: impl Into<String>, operation: Operation) -> NodeId {
        let (num_inputs, num_outputs) = operation.slot_counts();
        self.nodes.push(OperationNode {
            name: name.into(),
            operation,
            inputs: vec![InputSlot::default(); num_inputs],
            outputs: vec![OutputSlot::default(); num_outputs],
        });
        self.nodes.len() - 1
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&OperationNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &OperationNode)> {
        self.nodes.iter().enumerate()
    }

    /// Nodes running an [`Operation::Input`].
    pub fn input_nodes(&self) -> impl Iterator<Item = (NodeId, &OperationNode)> {
        self.nodes()
            .filter(|(_, node)| matches!(node.operation, Operation::Input { .. }))
    }

    /// Nodes running an [`Operation::Output`].
    pub fn output_nodes(&self) -> impl Iterator<Item = (NodeId, &OperationNode)> {
        self.nodes()
            .filter(|(_, node)| matches!(node.operation, Operation::Output { .. }))
    }

    fn output_slot_mut(&mut self, slot: OutputSlotRef) -> Result<&mut OutputSlot> {
        self.nodes
            .get_mut(slot.node)
            .and_then(|node| node.outputs.get_mut(slot.slot))
            .ok_or(DeserializeError::InvalidSlot {
                node: slot.node,
                kind: SlotKind::Output,
                slot: slot.slot,
            })
    }

    fn input_slot_mut(&mut self, slot: InputSlotRef) -> Result<&mut InputSlot> {
        self.nodes
            .get_mut(slot.node)
            .and_then(|node| node.inputs.get_mut(slot.slot))
            .ok_or(DeserializeError::InvalidSlot {
                node: slot.node,
                kind: SlotKind::Input,
                slot: slot.slot,
            })
    }

    pub fn set_tensor_info(&mut self, slot: OutputSlotRef, info: TensorInfo) -> Result<()> {
        self.output_slot_mut(slot)?.tensor_info = Some(info);
        Ok(())
    }

    pub fn tensor_info(&self, slot: OutputSlotRef) -> Option<&TensorInfo> {
        self.nodes
            .get(slot.node)?
            .outputs
            .get(slot.slot)?
            .tensor_info
            .as_ref()
    }

    /// Connects `from` to `to`. The producer's descriptor must already be set and `to` must not
    /// be connected yet.
    pub fn connect(&mut self, from: OutputSlotRef, to: InputSlotRef) -> Result<()> {
        if self.output_slot_mut(from)?.tensor_info.is_none() {
            return Err(DeserializeError::UnsetTensorInfo {
                node: from.node,
                slot: from.slot,
            });
        }
        let input = self.input_slot_mut(to)?;
        if input.connection.is_some() {
            return Err(DeserializeError::InputAlreadyConnected {
                node: to.node,
                slot: to.slot,
            });
        }
        input.connection = Some(from);
        self.output_slot_mut(from)?.connections.push(to);
        trace!(?from, ?to, "connected");
        Ok(())
    }

    /// The output slot feeding `slot`, if it is connected.
    pub fn producer_of(&self, slot: InputSlotRef) -> Option<OutputSlotRef> {
        self.nodes.get(slot.node)?.inputs.get(slot.slot)?.connection
    }

    /// The input slots fed by `slot`, in connection order.
    pub fn consumers_of(&self, slot: OutputSlotRef) -> &[InputSlotRef] {
        self.nodes
            .get(slot.node)
            .and_then(|node| node.outputs.get(slot.slot))
            .map(|output| output.connections.as_slice())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{DataType, TensorShape};

    fn info() -> TensorInfo {
        TensorInfo::new(TensorShape::new(vec![1, 4]), DataType::Float32)
    }

    #[test]
    fn test_nodes_get_slots_from_operation() {
        let mut network = Network::new();
        let add = network.add_node("add", Operation::Addition);
        let switch = network.add_node("switch", Operation::Switch);
        let node = network.node(add).unwrap();
        assert_eq!((node.num_inputs(), node.num_outputs()), (2, 1));
        let node = network.node(switch).unwrap();
        assert_eq!((node.num_inputs(), node.num_outputs()), (2, 2));
    }

    #[test]
    fn test_connect_fans_out() -> anyhow::Result<()> {
        let mut network = Network::new();
        let input = network.add_node("in", Operation::Input { binding_id: 0 });
        let add = network.add_node("add", Operation::Addition);
        let produced = OutputSlotRef::new(input, 0);
        network.set_tensor_info(produced, info())?;
        network.connect(produced, InputSlotRef::new(add, 0))?;
        network.connect(produced, InputSlotRef::new(add, 1))?;

        assert_eq!(network.consumers_of(produced).len(), 2);
        assert_eq!(network.producer_of(InputSlotRef::new(add, 1)), Some(produced));
        Ok(())
    }

    #[test]
    fn test_connect_rejects_misuse() -> anyhow::Result<()> {
        let mut network = Network::new();
        let input = network.add_node("in", Operation::Input { binding_id: 0 });
        let floor = network.add_node("floor", Operation::Floor);
        let produced = OutputSlotRef::new(input, 0);
        let consumer = InputSlotRef::new(floor, 0);

        assert!(matches!(
            network.connect(produced, consumer),
            Err(DeserializeError::UnsetTensorInfo { .. })
        ));
        network.set_tensor_info(produced, info())?;
        network.connect(produced, consumer)?;
        assert!(matches!(
            network.connect(produced, consumer),
            Err(DeserializeError::InputAlreadyConnected { .. })
        ));
        assert!(matches!(
            network.connect(produced, InputSlotRef::new(floor, 1)),
            Err(DeserializeError::InvalidSlot {
                kind: SlotKind::Input,
                ..
            })
        ));
        Ok(())
    }
}
