//! Operator parameters of the in-memory graph.
use serde::Serialize;

use crate::tensor::TensorShape;

wire_enum! {
    pub enum DataLayout: u8 {
        Nhwc = 0,
        Nchw = 1,
        Ndhwc = 2,
        Ncdhw = 3,
    }
}

wire_enum! {
    pub enum ActivationFunction: u8 {
        Sigmoid = 0,
        TanH = 1,
        Linear = 2,
        ReLu = 3,
        BoundedReLu = 4,
        SoftReLu = 5,
        LeakyReLu = 6,
        Abs = 7,
        Sqrt = 8,
        Square = 9,
        Elu = 10,
        HardSwish = 11,
    }
}

wire_enum! {
    pub enum ArgMinMaxFunction: u8 {
        Min = 0,
        Max = 1,
    }
}

wire_enum! {
    pub enum ComparisonOperation: u8 {
        Equal = 0,
        Greater = 1,
        GreaterOrEqual = 2,
        Less = 3,
        LessOrEqual = 4,
        NotEqual = 5,
    }
}

wire_enum! {
    pub enum UnaryOperation: u8 {
        Abs = 0,
        Rsqrt = 1,
        Sqrt = 2,
        Exp = 3,
        Neg = 4,
        LogicalNot = 5,
        Log = 6,
        Sin = 7,
    }
}

wire_enum! {
    pub enum LogicalBinaryOperation: u8 {
        LogicalAnd = 0,
        LogicalOr = 1,
    }
}

wire_enum! {
    pub enum ReduceOperation: u8 {
        Sum = 0,
        Max = 1,
        Mean = 2,
        Min = 3,
        Prod = 4,
    }
}

wire_enum! {
    pub enum NormalizationAlgorithmChannel: u8 {
        Across = 0,
        Within = 1,
    }
}

wire_enum! {
    pub enum NormalizationAlgorithmMethod: u8 {
        LocalBrightness = 0,
        LocalContrast = 1,
    }
}

wire_enum! {
    pub enum OutputShapeRounding: u8 {
        Floor = 0,
        Ceiling = 1,
    }
}

wire_enum! {
    pub enum PoolingAlgorithm: u8 {
        Max = 0,
        Average = 1,
        L2 = 2,
    }
}

wire_enum! {
    pub enum PaddingMethod: u8 {
        IgnoreValue = 0,
        Exclude = 1,
    }
}

wire_enum! {
    pub enum PaddingMode: u8 {
        Constant = 0,
        Reflect = 1,
        Symmetric = 2,
    }
}

wire_enum! {
    pub enum ResizeMethod: u8 {
        NearestNeighbor = 0,
        Bilinear = 1,
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ActivationDescriptor {
    pub function: ActivationFunction,
    pub a: f32,
    pub b: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ArgMinMaxDescriptor {
    pub function: ArgMinMaxFunction,
    pub axis: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BatchNormalizationDescriptor {
    pub eps: f32,
    pub data_layout: DataLayout,
}

/// Shared by batch-to-space and space-to-batch: `pairs` holds the crops or the padding.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SpaceBatchDescriptor {
    pub block_shape: Vec<u32>,
    pub pairs: Vec<(u32, u32)>,
    pub data_layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelShuffleDescriptor {
    pub axis: u32,
    pub num_groups: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonDescriptor {
    pub operation: ComparisonOperation,
}

/// Where each input view is placed in the concatenated output.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OriginsDescriptor {
    pub concat_axis: u32,
    pub num_dimensions: u32,
    pub view_origins: Vec<Vec<u32>>,
}

impl OriginsDescriptor {
    pub fn num_views(&self) -> usize {
        self.view_origins.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ViewsDescriptor {
    pub origins: OriginsDescriptor,
    pub view_sizes: Vec<Vec<u32>>,
}

impl ViewsDescriptor {
    pub fn num_views(&self) -> usize {
        self.view_sizes.len()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Convolution2dDescriptor {
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    pub dilation_x: u32,
    pub dilation_y: u32,
    pub bias_enabled: bool,
    pub data_layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Convolution3dDescriptor {
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub pad_front: u32,
    pub pad_back: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    pub stride_z: u32,
    pub dilation_x: u32,
    pub dilation_y: u32,
    pub dilation_z: u32,
    pub bias_enabled: bool,
    pub data_layout: DataLayout,
}

impl Convolution3dDescriptor {
    /// Input, weights and the optional bias.
    pub fn num_inputs(&self) -> usize {
        2 + usize::from(self.bias_enabled)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransposeConvolution2dDescriptor {
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    pub bias_enabled: bool,
    pub data_layout: DataLayout,
}

/// Shared by depth-to-space and space-to-depth.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockDescriptor {
    pub block_size: u32,
    pub data_layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionPostProcessDescriptor {
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

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ElementwiseUnaryDescriptor {
    pub operation: UnaryOperation,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FillDescriptor {
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FullyConnectedDescriptor {
    pub bias_enabled: bool,
    pub transpose_weight_matrix: bool,
    pub constant_weights: bool,
}

impl FullyConnectedDescriptor {
    /// Input, weights and the optional bias.
    pub fn num_inputs(&self) -> usize {
        2 + usize::from(self.bias_enabled)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GatherDescriptor {
    pub axis: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InstanceNormalizationDescriptor {
    pub gamma: f32,
    pub beta: f32,
    pub eps: f32,
    pub data_layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct L2NormalizationDescriptor {
    pub eps: f32,
    pub data_layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogicalBinaryDescriptor {
    pub operation: LogicalBinaryOperation,
}

/// Shared by softmax and log-softmax.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SoftmaxDescriptor {
    pub beta: f32,
    pub axis: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LstmDescriptor {
    /// Activation code as used by TfLite's fused activations, kept verbatim.
    pub activation_func: u32,
    pub clipping_thres_cell: f32,
    pub clipping_thres_proj: f32,
    pub cifg_enabled: bool,
    pub peephole_enabled: bool,
    pub projection_enabled: bool,
    pub layer_norm_enabled: bool,
    pub time_major: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QLstmDescriptor {
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

/// Shared by mean and reduce.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReduceDescriptor {
    pub axis: Vec<u32>,
    pub keep_dims: bool,
    pub operation: ReduceOperation,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NormalizationDescriptor {
    pub channel_type: NormalizationAlgorithmChannel,
    pub method_type: NormalizationAlgorithmMethod,
    pub norm_size: u32,
    pub alpha: f32,
    pub beta: f32,
    pub k: f32,
    pub data_layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PadDescriptor {
    pub pad_list: Vec<(u32, u32)>,
    pub pad_value: f32,
    pub padding_mode: PaddingMode,
}

/// Shared by permute and transpose. Permute sends source dimension `i` to `dim_mappings[i]`,
/// transpose reads destination dimension `i` from `dim_mappings[i]`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PermutationDescriptor {
    pub dim_mappings: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pooling2dDescriptor {
    pub pool_type: PoolingAlgorithm,
    pub pad_left: u32,
    pub pad_right: u32,
    pub pad_top: u32,
    pub pad_bottom: u32,
    pub pool_width: u32,
    pub pool_height: u32,
    pub stride_x: u32,
    pub stride_y: u32,
    pub output_shape_rounding: OutputShapeRounding,
    pub padding_method: PaddingMethod,
    pub data_layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pooling3dDescriptor {
    pub pool_type: PoolingAlgorithm,
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
    pub output_shape_rounding: OutputShapeRounding,
    pub padding_method: PaddingMethod,
    pub data_layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReshapeDescriptor {
    pub target_shape: TensorShape,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResizeDescriptor {
    pub target_width: u32,
    pub target_height: u32,
    pub method: ResizeMethod,
    pub data_layout: DataLayout,
    pub align_corners: bool,
    pub half_pixel_centers: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SliceDescriptor {
    pub begin: Vec<u32>,
    pub size: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StackDescriptor {
    pub axis: u32,
    pub num_inputs: u32,
    pub input_shape: TensorShape,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StandInDescriptor {
    pub num_inputs: u32,
    pub num_outputs: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StridedSliceDescriptor {
    pub begin: Vec<i32>,
    pub end: Vec<i32>,
    pub stride: Vec<i32>,
    pub begin_mask: i32,
    pub end_mask: i32,
    pub shrink_axis_mask: i32,
    pub ellipsis_mask: i32,
    pub new_axis_mask: i32,
    pub data_layout: DataLayout,
}
