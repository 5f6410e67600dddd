//! Serialized form of a network: a versioned envelope around a MessagePack encoded
//! [`SerializedGraph`]. Constant data blocks are borrowed from the input buffer.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DeserializeError, Result};

mod layers;

pub use layers::*;

/// Logical index of a layer, as opposed to its position in [`SerializedGraph::layers`].
pub type LayerIndex = u32;

pub const MAGIC: [u8; 4] = *b"NGRF";
pub const SCHEMA_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SerializedGraph<'a> {
    #[serde(borrow)]
    pub layers: Vec<AnyLayer<'a>>,
    /// Identifies the graph inputs, either by logical layer index or by binding id depending on
    /// [`FeatureVersions::binding_ids_scheme`].
    pub input_ids: Vec<i32>,
    pub output_ids: Vec<i32>,
    #[serde(default)]
    pub feature_versions: Option<FeatureVersions>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureVersions {
    pub binding_ids_scheme: u32,
    pub weights_layout_scheme: u32,
    pub constant_tensors_as_inputs: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnyLayer<'a> {
    pub layer_type: u32,
    #[serde(borrow)]
    pub layer: LayerRecord<'a>,
}

impl<'a> AnyLayer<'a> {
    pub fn new(layer: LayerRecord<'a>) -> Self {
        let layer_type = layer.layer_type().map(LayerType::wire_code).unwrap_or(u32::MAX);
        Self { layer_type, layer }
    }

    pub fn base(&self) -> &LayerBase {
        self.layer.base()
    }
}

/// Fields shared by every layer record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LayerBase {
    /// Logical index of the layer. Connections refer to layers by this value, not by their
    /// position in [`SerializedGraph::layers`].
    pub index: LayerIndex,
    pub name: String,
    #[serde(default)]
    pub input_slots: Vec<InputSlotRecord>,
    #[serde(default)]
    pub output_slots: Vec<OutputSlotRecord>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source_layer_index: LayerIndex,
    pub output_slot_index: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputSlotRecord {
    pub index: u32,
    pub connection: Connection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputSlotRecord {
    pub index: u32,
    #[serde(default)]
    pub tensor_info: Option<TensorInfoRecord>,
}

fn specified() -> u8 {
    1
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TensorInfoRecord {
    pub dimensions: Vec<u32>,
    pub data_type: u8,
    #[serde(default)]
    pub quantization_scale: f32,
    #[serde(default)]
    pub quantization_offset: i32,
    #[serde(default)]
    pub quantization_scales: Vec<f32>,
    #[serde(default)]
    pub quantization_dim: u32,
    #[serde(default = "specified")]
    pub dimensionality: u8,
    #[serde(default)]
    pub dimension_specificity: Vec<bool>,
    #[serde(default)]
    pub is_constant: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConstTensorRecord<'a> {
    #[serde(default)]
    pub info: Option<TensorInfoRecord>,
    /// Element width tag of `data`, see [`crate::tensor::ConstTensorData`].
    pub data_type: u8,
    #[serde(with = "serde_bytes", borrow)]
    pub data: &'a [u8],
}

/// Encodes `graph` into a buffer accepted by [`verify`].
pub fn encode_graph(graph: &SerializedGraph<'_>) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    let body = rmp_serde::to_vec_named(graph)?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(body.len() as u64).to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Checks the envelope and the structure of the encoded graph, returning the decoded records.
/// Nothing is interpreted beyond what is needed to guarantee that later decoding only ever sees
/// consistent records.
pub fn verify(bytes: &[u8]) -> Result<SerializedGraph<'_>> {
    let malformed = |reason: String| DeserializeError::MalformedBuffer(reason);
    if bytes.len() < HEADER_LEN {
        return Err(malformed(format!(
            "{} bytes is too short for a graph header",
            bytes.len()
        )));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    if header[..4] != MAGIC {
        return Err(malformed(format!("bad magic {:?}", &header[..4])));
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version == 0 || version > SCHEMA_VERSION {
        return Err(malformed(format!("unsupported schema version {version}")));
    }
    let mut len = [0u8; 8];
    len.copy_from_slice(&header[8..]);
    let declared = u64::from_le_bytes(len);
    if declared != body.len() as u64 {
        return Err(malformed(format!(
            "header declares {declared} body bytes, found {}",
            body.len()
        )));
    }
    let graph: SerializedGraph<'_> =
        rmp_serde::from_slice(body).map_err(|e| malformed(format!("cannot decode graph: {e}")))?;

    for (position, layer) in graph.layers.iter().enumerate() {
        match (layer.layer.layer_type(), LayerType::from_wire(layer.layer_type)) {
            (None, None) => {}
            (Some(payload), Some(tag)) if payload == tag => {}
            (payload, _) => {
                return Err(malformed(format!(
                    "layer #{position} is tagged {} but holds a {payload:?} record",
                    layer.layer_type
                )));
            }
        }
        let base = layer.base();
        let mut seen = HashSet::new();
        if !base.input_slots.iter().all(|slot| seen.insert(slot.index)) {
            return Err(malformed(format!(
                "layer #{position} declares the same input slot twice"
            )));
        }
        seen.clear();
        if !base.output_slots.iter().all(|slot| seen.insert(slot.index)) {
            return Err(malformed(format!(
                "layer #{position} declares the same output slot twice"
            )));
        }
    }
    debug!(
        layers = graph.layers.len(),
        version, "verified serialized graph"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::GraphFixture;

    fn sample() -> anyhow::Result<Vec<u8>> {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        fixture.output("out", input);
        Ok(fixture.encode()?)
    }

    #[test]
    fn test_verify_accepts_encoded_graph() -> anyhow::Result<()> {
        let bytes = sample()?;
        let graph = verify(&bytes)?;
        assert_eq!(graph.layers.len(), 2);
        assert_eq!(graph.input_ids, vec![0]);
        Ok(())
    }

    #[test]
    fn test_verify_rejects_damaged_envelopes() -> anyhow::Result<()> {
        let bytes = sample()?;

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        let mut bad_version = bytes.clone();
        bad_version[4..8].copy_from_slice(&7u32.to_le_bytes());
        let truncated = &bytes[..bytes.len() - 1];
        let mut garbage = bytes[..HEADER_LEN].to_vec();
        garbage[8..].copy_from_slice(&3u64.to_le_bytes());
        garbage.extend_from_slice(&[0xc1, 0xc1, 0xc1]);

        let empty: &[u8] = &[];
        for case in [&bad_magic[..], &bad_version[..], truncated, &garbage[..], empty] {
            assert!(matches!(
                verify(case),
                Err(DeserializeError::MalformedBuffer(_))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_verify_rejects_tag_payload_mismatch() -> anyhow::Result<()> {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        fixture.output("out", input);
        fixture.graph.layers[0].layer_type = LayerType::Addition.wire_code();
        let bytes = fixture.encode()?;
        assert!(matches!(
            verify(&bytes),
            Err(DeserializeError::MalformedBuffer(_))
        ));
        Ok(())
    }

    #[test]
    fn test_verify_rejects_repeated_slot_index() -> anyhow::Result<()> {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        let add = fixture.add("add", input, input);
        fixture.output("out", add);
        let base = fixture.graph.layers[1].layer.base_mut();
        base.input_slots[1].index = 0;
        let bytes = fixture.encode()?;
        assert!(matches!(
            verify(&bytes),
            Err(DeserializeError::MalformedBuffer(_))
        ));
        Ok(())
    }
}
