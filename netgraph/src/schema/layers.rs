//! Layer records as they appear on the wire. Enumerations are kept as raw codes here and only
//! interpreted by the layer decoders.
use serde::{Deserialize, Serialize};

use super::{ConstTensorRecord, LayerBase};

wire_enum! {
    /// Tag identifying the kind of a serialized layer.
    pub enum LayerType: u32 {
        Addition = 0,
        Input = 1,
        Multiplication = 2,
        Output = 3,
        Pooling2d = 4,
        Reshape = 5,
        Softmax = 6,
        Convolution2d = 7,
        DepthwiseConvolution2d = 8,
        Activation = 9,
        Permute = 10,
        FullyConnected = 11,
        Constant = 12,
        SpaceToBatchNd = 13,
        BatchToSpaceNd = 14,
        Division = 15,
        Minimum = 16,
        Equal = 17,
        Maximum = 18,
        Normalization = 19,
        Pad = 20,
        Rsqrt = 21,
        Floor = 22,
        BatchNormalization = 23,
        Greater = 24,
        ResizeBilinear = 25,
        Subtraction = 26,
        StridedSlice = 27,
        Gather = 28,
        Mean = 29,
        Merger = 30,
        L2Normalization = 31,
        Splitter = 32,
        DetectionPostProcess = 33,
        Lstm = 34,
        Quantize = 35,
        Dequantize = 36,
        Merge = 37,
        Switch = 38,
        Concat = 39,
        SpaceToDepth = 40,
        Prelu = 41,
        TransposeConvolution2d = 42,
        QuantizedLstm = 43,
        Resize = 44,
        Stack = 45,
        QLstm = 46,
        Abs = 47,
        ArgMinMax = 48,
        Slice = 49,
        DepthToSpace = 50,
        InstanceNormalization = 51,
        LogSoftmax = 52,
        Comparison = 53,
        StandIn = 54,
        ElementwiseUnary = 55,
        Transpose = 56,
        Fill = 57,
        Rank = 58,
        LogicalBinary = 59,
        Reduce = 60,
        Cast = 61,
        Shape = 62,
        UnidirectionalSequenceLstm = 63,
        ChannelShuffle = 64,
        Convolution3d = 65,
        Pooling3d = 66,
    }
}

/// One past the largest [`LayerType`] code.
pub const LAYER_TYPE_COUNT: usize = LayerType::Pooling3d.wire_code() as usize + 1;

/// Access to the [`LayerBase`] embedded in every layer record.
pub trait HasBase {
    fn base(&self) -> &LayerBase;
    fn base_mut(&mut self) -> &mut LayerBase;
}

impl HasBase for LayerBase {
    fn base(&self) -> &LayerBase {
        self
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        self
    }
}

macro_rules! impl_has_base {
    ($($record:ident $(<$lt:lifetime>)?),+ $(,)?) => {
        $(
            impl $(<$lt>)? HasBase for $record $(<$lt>)? {
                fn base(&self) -> &LayerBase {
                    &self.base
                }

                fn base_mut(&mut self) -> &mut LayerBase {
                    &mut self.base
                }
            }
        )+
    };
}

/// Declares [`LayerRecord`]: one variant per layer type, named after it, plus `Opaque` for
/// records whose tag this crate does not know. Records that embed constants are marked
/// `[borrow]` so their data stays borrowed from the input buffer.
macro_rules! layer_records {
    ($($variant:ident($record:ty) $([$borrow:ident])?),+ $(,)?) => {
        #[derive(Clone, Debug, Serialize, Deserialize)]
        pub enum LayerRecord<'a> {
            $($variant($(#[serde($borrow)])? $record),)+
            Opaque(LayerBase),
        }

        impl<'a> LayerRecord<'a> {
            /// The layer type this record describes, `None` for opaque records.
            pub fn layer_type(&self) -> Option<LayerType> {
                match self {
                    $(Self::$variant(_) => Some(LayerType::$variant),)+
                    Self::Opaque(_) => None,
                }
            }

            pub fn base(&self) -> &LayerBase {
                match self {
                    $(Self::$variant(record) => record.base(),)+
                    Self::Opaque(base) => base,
                }
            }

            pub fn base_mut(&mut self) -> &mut LayerBase {
                match self {
                    $(Self::$variant(record) => record.base_mut(),)+
                    Self::Opaque(base) => base,
                }
            }
        }
    };
}

layer_records! {
    Addition(LayerBase),
    Input(BindableLayer),
    Multiplication(LayerBase),
    Output(BindableLayer),
    Pooling2d(Pooling2dLayer),
    Reshape(ReshapeLayer),
    Softmax(SoftmaxLayer),
    Convolution2d(Convolution2dLayer<'a>) [borrow],
    DepthwiseConvolution2d(DepthwiseConvolution2dLayer<'a>) [borrow],
    Activation(ActivationLayer),
    Permute(PermuteLayer),
    FullyConnected(FullyConnectedLayer<'a>) [borrow],
    Constant(ConstantLayer<'a>) [borrow],
    SpaceToBatchNd(SpaceToBatchNdLayer),
    BatchToSpaceNd(BatchToSpaceNdLayer),
    Division(LayerBase),
    Minimum(LayerBase),
    Equal(LayerBase),
    Maximum(LayerBase),
    Normalization(NormalizationLayer),
    Pad(PadLayer),
    Rsqrt(LayerBase),
    Floor(LayerBase),
    BatchNormalization(BatchNormalizationLayer<'a>) [borrow],
    Greater(LayerBase),
    ResizeBilinear(ResizeBilinearLayer),
    Subtraction(LayerBase),
    StridedSlice(StridedSliceLayer),
    Gather(GatherLayer),
    Mean(MeanLayer),
    Merger(ConcatLayer),
    L2Normalization(L2NormalizationLayer),
    Splitter(SplitterLayer),
    DetectionPostProcess(DetectionPostProcessLayer<'a>) [borrow],
    Lstm(LstmLayer<'a>) [borrow],
    Quantize(LayerBase),
    Dequantize(LayerBase),
    Merge(LayerBase),
    Switch(LayerBase),
    Concat(ConcatLayer),
    SpaceToDepth(SpaceToDepthLayer),
    Prelu(LayerBase),
    TransposeConvolution2d(TransposeConvolution2dLayer<'a>) [borrow],
    QuantizedLstm(QuantizedLstmLayer<'a>) [borrow],
    Resize(ResizeLayer),
    Stack(StackLayer),
    QLstm(QLstmLayer<'a>) [borrow],
    Abs(LayerBase),
    ArgMinMax(ArgMinMaxLayer),
    Slice(SliceLayer),
    DepthToSpace(DepthToSpaceLayer),
    InstanceNormalization(InstanceNormalizationLayer),
    LogSoftmax(LogSoftmaxLayer),
    Comparison(ComparisonLayer),
    StandIn(StandInLayer),
    ElementwiseUnary(ElementwiseUnaryLayer),
    Transpose(TransposeLayer),
    Fill(FillLayer),
    Rank(LayerBase),
    LogicalBinary(LogicalBinaryLayer),
    Reduce(ReduceLayer),
    Cast(LayerBase),
    Shape(LayerBase),
    UnidirectionalSequenceLstm(UnidirectionalSequenceLstmLayer<'a>) [borrow],
    ChannelShuffle(ChannelShuffleLayer),
    Convolution3d(Convolution3dLayer),
    Pooling3d(Pooling3dLayer),
}

impl_has_base!(
    BindableLayer,
    Pooling2dLayer,
    Pooling3dLayer,
    ReshapeLayer,
    SoftmaxLayer,
    LogSoftmaxLayer,
    Convolution2dLayer<'a>,
    Convolution3dLayer,
    DepthwiseConvolution2dLayer<'a>,
    TransposeConvolution2dLayer<'a>,
    ActivationLayer,
    PermuteLayer,
    TransposeLayer,
    FullyConnectedLayer<'a>,
    ConstantLayer<'a>,
    SpaceToBatchNdLayer,
    BatchToSpaceNdLayer,
    NormalizationLayer,
    PadLayer,
    BatchNormalizationLayer<'a>,
    ResizeBilinearLayer,
    ResizeLayer,
    StridedSliceLayer,
    GatherLayer,
    MeanLayer,
    ConcatLayer,
    L2NormalizationLayer,
    SplitterLayer,
    DetectionPostProcessLayer<'a>,
    LstmLayer<'a>,
    QLstmLayer<'a>,
    QuantizedLstmLayer<'a>,
    UnidirectionalSequenceLstmLayer<'a>,
    SpaceToDepthLayer,
    DepthToSpaceLayer,
    StackLayer,
    ArgMinMaxLayer,
    SliceLayer,
    InstanceNormalizationLayer,
    ComparisonLayer,
    StandInLayer,
    ElementwiseUnaryLayer,
    FillLayer,
    LogicalBinaryLayer,
    ReduceLayer,
    ChannelShuffleLayer,
);

/// Input and output layers: the binding id distinguishes them among the graph's bound tensors.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BindableLayer {
    pub base: LayerBase,
    pub layer_binding_id: i32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub activation_function: u8,
    #[serde(default)]
    pub a: f32,
    #[serde(default)]
    pub b: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ActivationLayer {
    pub base: LayerBase,
    pub descriptor: ActivationRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArgMinMaxRecord {
    pub arg_min_max_function: u8,
    pub axis: i32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ArgMinMaxLayer {
    pub base: LayerBase,
    pub descriptor: ArgMinMaxRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchToSpaceNdRecord {
    pub block_shape: Vec<u32>,
    /// Flattened `(begin, end)` pairs, one per spatial dimension.
    pub crops: Vec<u32>,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchToSpaceNdLayer {
    pub base: LayerBase,
    pub descriptor: BatchToSpaceNdRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaceToBatchNdRecord {
    pub block_shape: Vec<u32>,
    /// Flattened `(before, after)` pairs, one per spatial dimension.
    pub pad_list: Vec<u32>,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaceToBatchNdLayer {
    pub base: LayerBase,
    pub descriptor: SpaceToBatchNdRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchNormalizationRecord {
    pub eps: f32,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BatchNormalizationLayer<'a> {
    pub base: LayerBase,
    pub descriptor: BatchNormalizationRecord,
    #[serde(default, borrow)]
    pub mean: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub variance: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub beta: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub gamma: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChannelShuffleRecord {
    pub axis: u32,
    pub num_groups: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChannelShuffleLayer {
    pub base: LayerBase,
    pub descriptor: ChannelShuffleRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComparisonRecord {
    pub operation: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComparisonLayer {
    pub base: LayerBase,
    pub descriptor: ComparisonRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct OriginsRecord {
    pub concat_axis: u32,
    pub num_views: u32,
    pub num_dimensions: u32,
    pub view_origins: Vec<Vec<u32>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConcatLayer {
    pub base: LayerBase,
    pub descriptor: OriginsRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ViewsRecord {
    pub origins: OriginsRecord,
    pub view_sizes: Vec<Vec<u32>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SplitterLayer {
    pub base: LayerBase,
    pub descriptor: ViewsRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConstantLayer<'a> {
    pub base: LayerBase,
    #[serde(default, borrow)]
    pub input: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Convolution2dRecord {
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    #[serde(default = "one")]
    pub dilation_x: u32,
    #[serde(default = "one")]
    pub dilation_y: u32,
    pub bias_enabled: bool,
    pub data_layout: u8,
}

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Convolution2dLayer<'a> {
    pub base: LayerBase,
    pub descriptor: Convolution2dRecord,
    #[serde(default, borrow)]
    pub weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub biases: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DepthwiseConvolution2dLayer<'a> {
    pub base: LayerBase,
    pub descriptor: Convolution2dRecord,
    #[serde(default, borrow)]
    pub weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub biases: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Convolution3dRecord {
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub pad_front: u32,
    pub pad_back: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    pub stride_z: u32,
    #[serde(default = "one")]
    pub dilation_x: u32,
    #[serde(default = "one")]
    pub dilation_y: u32,
    #[serde(default = "one")]
    pub dilation_z: u32,
    pub bias_enabled: bool,
    pub data_layout: u8,
}

/// Weights and biases of a 3D convolution arrive through its input slots.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Convolution3dLayer {
    pub base: LayerBase,
    pub descriptor: Convolution3dRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransposeConvolution2dRecord {
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    pub bias_enabled: bool,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransposeConvolution2dLayer<'a> {
    pub base: LayerBase,
    pub descriptor: TransposeConvolution2dRecord,
    #[serde(default, borrow)]
    pub weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub biases: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block_size: u32,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DepthToSpaceLayer {
    pub base: LayerBase,
    pub descriptor: BlockRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpaceToDepthLayer {
    pub base: LayerBase,
    pub descriptor: BlockRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionPostProcessRecord {
    pub max_detections: u32,
    pub max_classes_per_detection: u32,
    pub detections_per_class: u32,
    pub nms_score_threshold: f32,
    pub nms_iou_threshold: f32,
    pub num_classes: u32,
    pub use_regular_nms: bool,
    pub scale_x: f32,
    pub scale_y: f32,
    pub scale_w: f32,
    pub scale_h: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DetectionPostProcessLayer<'a> {
    pub base: LayerBase,
    pub descriptor: DetectionPostProcessRecord,
    #[serde(default, borrow)]
    pub anchors: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementwiseUnaryRecord {
    pub operation: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElementwiseUnaryLayer {
    pub base: LayerBase,
    pub descriptor: ElementwiseUnaryRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FillRecord {
    pub value: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FillLayer {
    pub base: LayerBase,
    pub descriptor: FillRecord,
}

fn yes() -> bool {
    true
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullyConnectedRecord {
    pub bias_enabled: bool,
    pub transpose_weights_matrix: bool,
    #[serde(default = "yes")]
    pub constant_weights: bool,
}

/// `weights` and `biases` are only present in graphs serialized before constant tensors became
/// regular inputs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullyConnectedLayer<'a> {
    pub base: LayerBase,
    pub descriptor: FullyConnectedRecord,
    #[serde(default, borrow)]
    pub weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub biases: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatherRecord {
    pub axis: i32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GatherLayer {
    pub base: LayerBase,
    pub descriptor: GatherRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InstanceNormalizationRecord {
    pub gamma: f32,
    pub beta: f32,
    pub eps: f32,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InstanceNormalizationLayer {
    pub base: LayerBase,
    pub descriptor: InstanceNormalizationRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct L2NormalizationRecord {
    pub data_layout: u8,
    pub eps: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct L2NormalizationLayer {
    pub base: LayerBase,
    pub descriptor: L2NormalizationRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LogicalBinaryRecord {
    pub operation: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LogicalBinaryLayer {
    pub base: LayerBase,
    pub descriptor: LogicalBinaryRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SoftmaxRecord {
    pub beta: f32,
    #[serde(default = "last_axis")]
    pub axis: i32,
}

fn last_axis() -> i32 {
    -1
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SoftmaxLayer {
    pub base: LayerBase,
    pub descriptor: SoftmaxRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LogSoftmaxLayer {
    pub base: LayerBase,
    pub descriptor: SoftmaxRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LstmRecord {
    pub activation_func: u32,
    pub clipping_thres_cell: f32,
    pub clipping_thres_proj: f32,
    pub cifg_enabled: bool,
    pub peephole_enabled: bool,
    pub projection_enabled: bool,
    pub layer_norm_enabled: bool,
    /// Only meaningful for unidirectional sequence LSTMs.
    #[serde(default)]
    pub time_major: bool,
}

/// Constant tensors of the LSTM family. Which ones must be present depends on the flags of the
/// layer's descriptor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LstmInputParamsRecord<'a> {
    #[serde(default, borrow)]
    pub input_to_forget_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_to_cell_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_to_output_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub recurrent_to_forget_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub recurrent_to_cell_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub recurrent_to_output_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub forget_gate_bias: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub cell_bias: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub output_gate_bias: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_to_input_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub recurrent_to_input_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub cell_to_input_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_gate_bias: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub projection_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub projection_bias: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub cell_to_forget_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub cell_to_output_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_layer_norm_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub forget_layer_norm_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub cell_layer_norm_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub output_layer_norm_weights: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LstmLayer<'a> {
    pub base: LayerBase,
    pub descriptor: LstmRecord,
    #[serde(borrow)]
    pub input_params: LstmInputParamsRecord<'a>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UnidirectionalSequenceLstmLayer<'a> {
    pub base: LayerBase,
    pub descriptor: LstmRecord,
    #[serde(borrow)]
    pub input_params: LstmInputParamsRecord<'a>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QLstmRecord {
    pub cifg_enabled: bool,
    pub peephole_enabled: bool,
    pub projection_enabled: bool,
    pub layer_norm_enabled: bool,
    pub cell_clip: f32,
    pub projection_clip: f32,
    pub input_intermediate_scale: f32,
    pub forget_intermediate_scale: f32,
    pub cell_intermediate_scale: f32,
    pub output_intermediate_scale: f32,
    pub hidden_state_zero_point: i32,
    pub hidden_state_scale: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QLstmLayer<'a> {
    pub base: LayerBase,
    pub descriptor: QLstmRecord,
    #[serde(borrow)]
    pub input_params: LstmInputParamsRecord<'a>,
}

/// All twelve tensors are mandatory.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuantizedLstmInputParamsRecord<'a> {
    #[serde(default, borrow)]
    pub input_to_input_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_to_forget_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_to_cell_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_to_output_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub recurrent_to_input_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub recurrent_to_forget_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub recurrent_to_cell_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub recurrent_to_output_weights: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub input_gate_bias: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub forget_gate_bias: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub cell_bias: Option<ConstTensorRecord<'a>>,
    #[serde(default, borrow)]
    pub output_gate_bias: Option<ConstTensorRecord<'a>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QuantizedLstmLayer<'a> {
    pub base: LayerBase,
    #[serde(borrow)]
    pub input_params: QuantizedLstmInputParamsRecord<'a>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeanRecord {
    pub axis: Vec<u32>,
    pub keep_dims: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MeanLayer {
    pub base: LayerBase,
    pub descriptor: MeanRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NormalizationRecord {
    pub norm_channel_type: u8,
    pub norm_method_type: u8,
    pub norm_size: u32,
    pub alpha: f32,
    pub beta: f32,
    pub k: f32,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NormalizationLayer {
    pub base: LayerBase,
    pub descriptor: NormalizationRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PadRecord {
    /// Flattened `(before, after)` pairs, one per dimension.
    pub pad_list: Vec<u32>,
    #[serde(default)]
    pub pad_value: f32,
    #[serde(default)]
    pub padding_mode: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PadLayer {
    pub base: LayerBase,
    pub descriptor: PadRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PermutationRecord {
    pub dim_mappings: Vec<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PermuteLayer {
    pub base: LayerBase,
    pub descriptor: PermutationRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransposeLayer {
    pub base: LayerBase,
    pub descriptor: PermutationRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Pooling2dRecord {
    pub pool_type: u8,
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub pool_width: u32,
    pub pool_height: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    pub output_shape_rounding: u8,
    pub padding_method: u8,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Pooling2dLayer {
    pub base: LayerBase,
    pub descriptor: Pooling2dRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Pooling3dRecord {
    pub pool_type: u8,
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub pad_front: u32,
    pub pad_back: u32,
    pub pool_width: u32,
    pub pool_height: u32,
    pub pool_depth: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    pub stride_z: u32,
    pub output_shape_rounding: u8,
    pub padding_method: u8,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Pooling3dLayer {
    pub base: LayerBase,
    pub descriptor: Pooling3dRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReduceRecord {
    pub keep_dims: bool,
    pub axis: Vec<u32>,
    pub reduce_operation: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReduceLayer {
    pub base: LayerBase,
    pub descriptor: ReduceRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReshapeRecord {
    /// At most one entry may be `-1`, meaning "inferred from the element count".
    pub target_shape: Vec<i32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReshapeLayer {
    pub base: LayerBase,
    pub descriptor: ReshapeRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResizeRecord {
    pub target_height: u32,
    pub target_width: u32,
    pub method: u8,
    pub data_layout: u8,
    #[serde(default)]
    pub align_corners: bool,
    #[serde(default)]
    pub half_pixel_centers: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResizeLayer {
    pub base: LayerBase,
    pub descriptor: ResizeRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResizeBilinearRecord {
    pub target_width: u32,
    pub target_height: u32,
    pub data_layout: u8,
    #[serde(default)]
    pub align_corners: bool,
    #[serde(default)]
    pub half_pixel_centers: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResizeBilinearLayer {
    pub base: LayerBase,
    pub descriptor: ResizeBilinearRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SliceRecord {
    pub begin: Vec<u32>,
    pub size: Vec<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SliceLayer {
    pub base: LayerBase,
    pub descriptor: SliceRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StackRecord {
    pub axis: u32,
    pub num_inputs: u32,
    pub input_shape: Vec<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StackLayer {
    pub base: LayerBase,
    pub descriptor: StackRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StandInRecord {
    pub num_inputs: u32,
    pub num_outputs: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StandInLayer {
    pub base: LayerBase,
    pub descriptor: StandInRecord,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StridedSliceRecord {
    pub begin: Vec<i32>,
    pub end: Vec<i32>,
    pub stride: Vec<i32>,
    #[serde(default)]
    pub begin_mask: i32,
    #[serde(default)]
    pub end_mask: i32,
    #[serde(default)]
    pub shrink_axis_mask: i32,
    #[serde(default)]
    pub ellipsis_mask: i32,
    #[serde(default)]
    pub new_axis_mask: i32,
    pub data_layout: u8,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StridedSliceLayer {
    pub base: LayerBase,
    pub descriptor: StridedSliceRecord,
}
