use derive_more::Display;

use crate::tensor::DataType;

/// Identifies the layer record a failure was raised for: its position in the serialized layer
/// list and its name.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
#[display("layer #{position} '{name}'")]
pub struct LayerLocation {
    pub position: usize,
    pub name: String,
}

impl LayerLocation {
    pub fn new(position: usize, name: impl Into<String>) -> Self {
        Self {
            position,
            name: name.into(),
        }
    }
}

/// Renders the optional location suffix carried by tensor level errors.
struct At<'a>(&'a Option<LayerLocation>);

impl std::fmt::Display for At<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(location) => write!(f, " at {location}"),
            None => Ok(()),
        }
    }
}

fn at(location: &Option<LayerLocation>) -> At<'_> {
    At(location)
}

#[derive(thiserror::Error, Debug)]
pub enum DeserializeError {
    #[error("Malformed buffer: {0}")]
    MalformedBuffer(String),
    #[error("Malformed tensor{}: {reason}", at(.location))]
    MalformedTensor {
        reason: String,
        location: Option<LayerLocation>,
    },
    #[error("Missing constant tensor '{tensor}'{}", at(.location))]
    NullConstant {
        tensor: &'static str,
        location: Option<LayerLocation>,
    },
    #[error(
        "Constant data holds {actual} elements but its tensor info declares {expected}{}",
        at(.location)
    )]
    SizeMismatch {
        expected: usize,
        actual: usize,
        location: Option<LayerLocation>,
    },
    #[error("Unsupported constant encoding{}: {reason}", at(.location))]
    UnsupportedEncoding {
        reason: String,
        location: Option<LayerLocation>,
    },
    #[error("Shape mismatch{}: {reason}", at(.location))]
    ShapeMismatch {
        reason: String,
        location: Option<LayerLocation>,
    },
    #[error("At most one dimension can be inferred, got target shape {shape:?}{}", at(.location))]
    MultipleWildcards {
        shape: Vec<i32>,
        location: Option<LayerLocation>,
    },
    #[error("Invalid parameter{}: {reason}", at(.location))]
    InvalidParameter {
        reason: String,
        location: Option<LayerLocation>,
    },
    #[error("{location} expects {expected} {kind} slot(s), found {actual}")]
    Arity {
        kind: SlotKind,
        expected: usize,
        actual: usize,
        location: LayerLocation,
    },
    #[error("{location} has layer type {layer_type} which is not supported")]
    UnsupportedLayer {
        layer_type: u32,
        location: LayerLocation,
    },
    #[error("Same output slot index {slot} of layer index {layer_index} processed twice")]
    DuplicateOutputRegistration { layer_index: u32, slot: u32 },
    #[error(
        "{consumers} input slot(s) wait on output slot {slot} of layer index {layer_index} but nothing produces it"
    )]
    DanglingConnection {
        layer_index: u32,
        slot: u32,
        consumers: usize,
    },
    #[error("No layer with index {0} in the serialized graph")]
    UnknownLayerIndex(u32),
    #[error("No {kind} binding named '{name}'")]
    UnknownBindingName { kind: SlotKind, name: String },
    #[error("No {kind} layer with binding id {binding_id}")]
    UnknownBindingId { kind: SlotKind, binding_id: i32 },
    #[error("Node {node} has no {kind} slot {slot}")]
    InvalidSlot {
        node: usize,
        kind: SlotKind,
        slot: usize,
    },
    #[error("Input slot {slot} of node {node} is already connected")]
    InputAlreadyConnected { node: usize, slot: usize },
    #[error("Output slot {slot} of node {node} has no tensor info")]
    UnsetTensorInfo { node: usize, slot: usize },
    #[error("Failed to read serialized graph: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum SlotKind {
    #[display("input")]
    Input,
    #[display("output")]
    Output,
}

pub type Result<T, E = DeserializeError> = std::result::Result<T, E>;

impl DeserializeError {
    pub(crate) fn malformed_tensor(reason: impl Into<String>) -> Self {
        Self::MalformedTensor {
            reason: reason.into(),
            location: None,
        }
    }

    pub(crate) fn invalid_parameter(reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            reason: reason.into(),
            location: None,
        }
    }

    pub(crate) fn shape_mismatch(reason: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            reason: reason.into(),
            location: None,
        }
    }

    pub(crate) fn unsupported_data_type(data_type: DataType, context: &str) -> Self {
        Self::UnsupportedEncoding {
            reason: format!("{context} does not support data type {data_type:?}"),
            location: None,
        }
    }

    /// Attaches `location` to tensor level errors that were raised without one. Errors that
    /// already carry a location are left untouched.
    pub fn located(mut self, here: &LayerLocation) -> Self {
        match &mut self {
            Self::MalformedTensor { location, .. }
            | Self::NullConstant { location, .. }
            | Self::SizeMismatch { location, .. }
            | Self::UnsupportedEncoding { location, .. }
            | Self::ShapeMismatch { location, .. }
            | Self::MultipleWildcards { location, .. }
            | Self::InvalidParameter { location, .. } => {
                if location.is_none() {
                    *location = Some(here.clone());
                }
            }
            _ => {}
        }
        self
    }

    /// The layer this error was raised for, when known.
    pub fn location(&self) -> Option<&LayerLocation> {
        match self {
            Self::MalformedTensor { location, .. }
            | Self::NullConstant { location, .. }
            | Self::SizeMismatch { location, .. }
            | Self::UnsupportedEncoding { location, .. }
            | Self::ShapeMismatch { location, .. }
            | Self::MultipleWildcards { location, .. }
            | Self::InvalidParameter { location, .. } => location.as_ref(),
            Self::Arity { location, .. } | Self::UnsupportedLayer { location, .. } => Some(location),
            _ => None,
        }
    }
}
