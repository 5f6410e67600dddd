use super::Deserializer;
use crate::{
    error::Result,
    schema::{LayerType, SerializedGraph, LAYER_TYPE_COUNT},
};

/// Decodes the record at the given position of the graph into the network under construction.
pub(crate) type LayerParser = fn(&mut Deserializer, &SerializedGraph<'_>, usize) -> Result<()>;

/// Builds the table of layer decoders, indexed by [`LayerType`] code. Input and output layers are
/// handled by the binding phase and have no entry.
pub(crate) fn parser_table() -> Vec<Option<LayerParser>> {
    let mut table: Vec<Option<LayerParser>> = vec![None; LAYER_TYPE_COUNT];
    let parsers: [(LayerType, LayerParser); 65] = [
        (LayerType::Abs, Deserializer::parse_abs),
        (LayerType::Activation, Deserializer::parse_activation),
        (LayerType::Addition, Deserializer::parse_addition),
        (LayerType::ArgMinMax, Deserializer::parse_arg_min_max),
        (LayerType::BatchNormalization, Deserializer::parse_batch_normalization),
        (LayerType::BatchToSpaceNd, Deserializer::parse_batch_to_space_nd),
        (LayerType::Cast, Deserializer::parse_cast),
        (LayerType::ChannelShuffle, Deserializer::parse_channel_shuffle),
        (LayerType::Comparison, Deserializer::parse_comparison),
        (LayerType::Concat, Deserializer::parse_concat),
        (LayerType::Constant, Deserializer::parse_constant),
        (LayerType::Convolution2d, Deserializer::parse_convolution2d),
        (LayerType::Convolution3d, Deserializer::parse_convolution3d),
        (LayerType::DepthToSpace, Deserializer::parse_depth_to_space),
        (LayerType::DepthwiseConvolution2d, Deserializer::parse_depthwise_convolution2d),
        (LayerType::Dequantize, Deserializer::parse_dequantize),
        (LayerType::DetectionPostProcess, Deserializer::parse_detection_post_process),
        (LayerType::Division, Deserializer::parse_division),
        (LayerType::ElementwiseUnary, Deserializer::parse_elementwise_unary),
        (LayerType::Equal, Deserializer::parse_equal),
        (LayerType::Fill, Deserializer::parse_fill),
        (LayerType::Floor, Deserializer::parse_floor),
        (LayerType::FullyConnected, Deserializer::parse_fully_connected),
        (LayerType::Gather, Deserializer::parse_gather),
        (LayerType::Greater, Deserializer::parse_greater),
        (LayerType::InstanceNormalization, Deserializer::parse_instance_normalization),
        (LayerType::L2Normalization, Deserializer::parse_l2_normalization),
        (LayerType::LogicalBinary, Deserializer::parse_logical_binary),
        (LayerType::LogSoftmax, Deserializer::parse_log_softmax),
        (LayerType::Lstm, Deserializer::parse_lstm),
        (LayerType::Maximum, Deserializer::parse_maximum),
        (LayerType::Mean, Deserializer::parse_mean),
        (LayerType::Merge, Deserializer::parse_merge),
        (LayerType::Merger, Deserializer::parse_concat),
        (LayerType::Minimum, Deserializer::parse_minimum),
        (LayerType::Multiplication, Deserializer::parse_multiplication),
        (LayerType::Normalization, Deserializer::parse_normalization),
        (LayerType::Pad, Deserializer::parse_pad),
        (LayerType::Permute, Deserializer::parse_permute),
        (LayerType::Pooling2d, Deserializer::parse_pooling2d),
        (LayerType::Pooling3d, Deserializer::parse_pooling3d),
        (LayerType::Prelu, Deserializer::parse_prelu),
        (LayerType::QLstm, Deserializer::parse_qlstm),
        (LayerType::Quantize, Deserializer::parse_quantize),
        (LayerType::QuantizedLstm, Deserializer::parse_quantized_lstm),
        (LayerType::Rank, Deserializer::parse_rank),
        (LayerType::Reduce, Deserializer::parse_reduce),
        (LayerType::Reshape, Deserializer::parse_reshape),
        (LayerType::Resize, Deserializer::parse_resize),
        (LayerType::ResizeBilinear, Deserializer::parse_resize_bilinear),
        (LayerType::Rsqrt, Deserializer::parse_rsqrt),
        (LayerType::Shape, Deserializer::parse_shape),
        (LayerType::Slice, Deserializer::parse_slice),
        (LayerType::Softmax, Deserializer::parse_softmax),
        (LayerType::SpaceToBatchNd, Deserializer::parse_space_to_batch_nd),
        (LayerType::SpaceToDepth, Deserializer::parse_space_to_depth),
        (LayerType::Splitter, Deserializer::parse_splitter),
        (LayerType::Stack, Deserializer::parse_stack),
        (LayerType::StandIn, Deserializer::parse_stand_in),
        (LayerType::StridedSlice, Deserializer::parse_strided_slice),
        (LayerType::Subtraction, Deserializer::parse_subtraction),
        (LayerType::Switch, Deserializer::parse_switch),
        (LayerType::Transpose, Deserializer::parse_transpose),
        (LayerType::TransposeConvolution2d, Deserializer::parse_transpose_convolution2d),
        (
            LayerType::UnidirectionalSequenceLstm,
            Deserializer::parse_unidirectional_sequence_lstm,
        ),
    ];
    for (layer_type, parser) in parsers {
        table[layer_type.wire_code() as usize] = Some(parser);
    }
    table
}

/// The decoder for tag `layer_type`. Tags outside the table get the unsupported fallback.
pub(crate) fn parser_for(table: &[Option<LayerParser>], layer_type: u32) -> LayerParser {
    usize::try_from(layer_type)
        .ok()
        .and_then(|code| table.get(code).copied().flatten())
        .unwrap_or(Deserializer::parse_unsupported)
}
