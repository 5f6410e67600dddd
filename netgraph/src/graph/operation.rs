use serde::Serialize;

use super::descriptors::*;
use crate::tensor::ConstTensor;

/// Constant tensors of an LSTM style operation. Optional groups are `None` unless the matching
/// feature flag of the descriptor is set.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LstmParams {
    pub input_to_forget_weights: Option<ConstTensor>,
    pub input_to_cell_weights: Option<ConstTensor>,
    pub input_to_output_weights: Option<ConstTensor>,
    pub recurrent_to_forget_weights: Option<ConstTensor>,
    pub recurrent_to_cell_weights: Option<ConstTensor>,
    pub recurrent_to_output_weights: Option<ConstTensor>,
    pub forget_gate_bias: Option<ConstTensor>,
    pub cell_bias: Option<ConstTensor>,
    pub output_gate_bias: Option<ConstTensor>,
    // cifg disabled
    pub input_to_input_weights: Option<ConstTensor>,
    pub recurrent_to_input_weights: Option<ConstTensor>,
    pub cell_to_input_weights: Option<ConstTensor>,
    pub input_gate_bias: Option<ConstTensor>,
    // projection
    pub projection_weights: Option<ConstTensor>,
    pub projection_bias: Option<ConstTensor>,
    // peephole
    pub cell_to_forget_weights: Option<ConstTensor>,
    pub cell_to_output_weights: Option<ConstTensor>,
    // layer norm
    pub input_layer_norm_weights: Option<ConstTensor>,
    pub forget_layer_norm_weights: Option<ConstTensor>,
    pub cell_layer_norm_weights: Option<ConstTensor>,
    pub output_layer_norm_weights: Option<ConstTensor>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuantizedLstmParams {
    pub input_to_input_weights: ConstTensor,
    pub input_to_forget_weights: ConstTensor,
    pub input_to_cell_weights: ConstTensor,
    pub input_to_output_weights: ConstTensor,
    pub recurrent_to_input_weights: ConstTensor,
    pub recurrent_to_forget_weights: ConstTensor,
    pub recurrent_to_cell_weights: ConstTensor,
    pub recurrent_to_output_weights: ConstTensor,
    pub input_gate_bias: ConstTensor,
    pub forget_gate_bias: ConstTensor,
    pub cell_bias: ConstTensor,
    pub output_gate_bias: ConstTensor,
}

/// What a node computes, with its parameters. Constant tensors are owned by the operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Operation {
    Input {
        binding_id: i32,
    },
    Output {
        binding_id: i32,
    },
    Activation(ActivationDescriptor),
    Addition,
    ArgMinMax(ArgMinMaxDescriptor),
    BatchNormalization {
        descriptor: BatchNormalizationDescriptor,
        mean: ConstTensor,
        variance: ConstTensor,
        beta: ConstTensor,
        gamma: ConstTensor,
    },
    BatchToSpaceNd(SpaceBatchDescriptor),
    Cast,
    ChannelShuffle(ChannelShuffleDescriptor),
    Comparison(ComparisonDescriptor),
    Concat(OriginsDescriptor),
    Constant(ConstTensor),
    Convolution2d {
        descriptor: Convolution2dDescriptor,
        weights: ConstTensor,
        biases: Option<ConstTensor>,
    },
    Convolution3d(Convolution3dDescriptor),
    DepthToSpace(BlockDescriptor),
    DepthwiseConvolution2d {
        descriptor: Convolution2dDescriptor,
        weights: ConstTensor,
        biases: Option<ConstTensor>,
    },
    Dequantize,
    DetectionPostProcess {
        descriptor: DetectionPostProcessDescriptor,
        anchors: ConstTensor,
    },
    Division,
    ElementwiseUnary(ElementwiseUnaryDescriptor),
    Fill(FillDescriptor),
    Floor,
    FullyConnected(FullyConnectedDescriptor),
    Gather(GatherDescriptor),
    InstanceNormalization(InstanceNormalizationDescriptor),
    L2Normalization(L2NormalizationDescriptor),
    LogicalBinary(LogicalBinaryDescriptor),
    LogSoftmax(SoftmaxDescriptor),
    Lstm {
        descriptor: LstmDescriptor,
        params: Box<LstmParams>,
    },
    Maximum,
    Mean(ReduceDescriptor),
    Merge,
    Minimum,
    Multiplication,
    Normalization(NormalizationDescriptor),
    Pad(PadDescriptor),
    Permute(PermutationDescriptor),
    Pooling2d(Pooling2dDescriptor),
    Pooling3d(Pooling3dDescriptor),
    Prelu,
    QLstm {
        descriptor: QLstmDescriptor,
        params: Box<LstmParams>,
    },
    Quantize,
    QuantizedLstm(Box<QuantizedLstmParams>),
    Rank,
    Reduce(ReduceDescriptor),
    Reshape(ReshapeDescriptor),
    Resize(ResizeDescriptor),
    Shape,
    Slice(SliceDescriptor),
    Softmax(SoftmaxDescriptor),
    SpaceToBatchNd(SpaceBatchDescriptor),
    SpaceToDepth(BlockDescriptor),
    Splitter(ViewsDescriptor),
    Stack(StackDescriptor),
    StandIn(StandInDescriptor),
    StridedSlice(StridedSliceDescriptor),
    Subtraction,
    Switch,
    Transpose(PermutationDescriptor),
    TransposeConvolution2d {
        descriptor: TransposeConvolution2dDescriptor,
        weights: ConstTensor,
        biases: Option<ConstTensor>,
    },
    UnidirectionalSequenceLstm {
        descriptor: LstmDescriptor,
        params: Box<LstmParams>,
    },
}

impl Operation {
    /// Number of input and output slots a node running this operation exposes.
    pub fn slot_counts(&self) -> (usize, usize) {
        match self {
            Self::Input { .. } | Self::Constant(_) => (0, 1),
            Self::Output { .. } => (1, 0),
            Self::Addition
            | Self::Subtraction
            | Self::Multiplication
            | Self::Division
            | Self::Minimum
            | Self::Maximum
            | Self::Comparison(_)
            | Self::LogicalBinary(_)
            | Self::Gather(_)
            | Self::Prelu
            | Self::Merge => (2, 1),
            Self::Switch => (2, 2),
            Self::DetectionPostProcess { .. } => (2, 4),
            Self::Lstm { .. } => (3, 4),
            Self::QLstm { .. } => (3, 3),
            Self::QuantizedLstm(_) => (3, 2),
            Self::UnidirectionalSequenceLstm { .. } => (3, 1),
            Self::Concat(origins) => (origins.num_views(), 1),
            Self::Splitter(views) => (1, views.num_views()),
            Self::Stack(stack) => (stack.num_inputs as usize, 1),
            Self::StandIn(stand_in) => {
                (stand_in.num_inputs as usize, stand_in.num_outputs as usize)
            }
            Self::Convolution3d(descriptor) => (descriptor.num_inputs(), 1),
            Self::FullyConnected(descriptor) => (descriptor.num_inputs(), 1),
            _ => (1, 1),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Input { .. } => "Input",
            Self::Output { .. } => "Output",
            Self::Activation(_) => "Activation",
            Self::Addition => "Addition",
            Self::ArgMinMax(_) => "ArgMinMax",
            Self::BatchNormalization { .. } => "BatchNormalization",
            Self::BatchToSpaceNd(_) => "BatchToSpaceNd",
            Self::Cast => "Cast",
            Self::ChannelShuffle(_) => "ChannelShuffle",
            Self::Comparison(_) => "Comparison",
            Self::Concat(_) => "Concat",
            Self::Constant(_) => "Constant",
            Self::Convolution2d { .. } => "Convolution2d",
            Self::Convolution3d(_) => "Convolution3d",
            Self::DepthToSpace(_) => "DepthToSpace",
            Self::DepthwiseConvolution2d { .. } => "DepthwiseConvolution2d",
            Self::Dequantize => "Dequantize",
            Self::DetectionPostProcess { .. } => "DetectionPostProcess",
            Self::Division => "Division",
            Self::ElementwiseUnary(_) => "ElementwiseUnary",
            Self::Fill(_) => "Fill",
            Self::Floor => "Floor",
            Self::FullyConnected(_) => "FullyConnected",
            Self::Gather(_) => "Gather",
            Self::InstanceNormalization(_) => "InstanceNormalization",
            Self::L2Normalization(_) => "L2Normalization",
            Self::LogicalBinary(_) => "LogicalBinary",
            Self::LogSoftmax(_) => "LogSoftmax",
            Self::Lstm { .. } => "Lstm",
            Self::Maximum => "Maximum",
            Self::Mean(_) => "Mean",
            Self::Merge => "Merge",
            Self::Minimum => "Minimum",
            Self::Multiplication => "Multiplication",
            Self::Normalization(_) => "Normalization",
            Self::Pad(_) => "Pad",
            Self::Permute(_) => "Permute",
            Self::Pooling2d(_) => "Pooling2d",
            Self::Pooling3d(_) => "Pooling3d",
            Self::Prelu => "Prelu",
            Self::QLstm { .. } => "QLstm",
            Self::Quantize => "Quantize",
            Self::QuantizedLstm(_) => "QuantizedLstm",
            Self::Rank => "Rank",
            Self::Reduce(_) => "Reduce",
            Self::Reshape(_) => "Reshape",
            Self::Resize(_) => "Resize",
            Self::Shape => "Shape",
            Self::Slice(_) => "Slice",
            Self::Softmax(_) => "Softmax",
            Self::SpaceToBatchNd(_) => "SpaceToBatchNd",
            Self::SpaceToDepth(_) => "SpaceToDepth",
            Self::Splitter(_) => "Splitter",
            Self::Stack(_) => "Stack",
            Self::StandIn(_) => "StandIn",
            Self::StridedSlice(_) => "StridedSlice",
            Self::Subtraction => "Subtraction",
            Self::Switch => "Switch",
            Self::Transpose(_) => "Transpose",
            Self::TransposeConvolution2d { .. } => "TransposeConvolution2d",
            Self::UnidirectionalSequenceLstm { .. } => "UnidirectionalSequenceLstm",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Input { binding_id } | Self::Output { binding_id } => {
                format!("{} (binding {binding_id})", self.kind())
            }
            Self::Constant(tensor) => format!("Constant: {:?}", tensor.info().shape().dims()),
            Self::Reshape(reshape) => format!("Reshape: {:?}", reshape.target_shape.dims()),
            Self::Activation(activation) => format!("Activation: {:?}", activation.function),
            Self::Comparison(comparison) => format!("Comparison: {:?}", comparison.operation),
            Self::ElementwiseUnary(unary) => format!("ElementwiseUnary: {:?}", unary.operation),
            Self::Resize(resize) => format!(
                "Resize: {:?} to {}x{}",
                resize.method, resize.target_height, resize.target_width
            ),
            _ => self.kind().to_string(),
        }
    }
}
