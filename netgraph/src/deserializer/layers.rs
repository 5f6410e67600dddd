//! One decoder per layer type. Every decoder turns the record's descriptor into its in-memory
//! form, copies the constants it needs out of the buffer and adds the node through
//! [`Deserializer::add_layer`], which checks the slot counts and registers the connections.
use itertools::Itertools;
use tracing::warn;

use super::{location, Deserializer};
use crate::{
    error::{DeserializeError, Result},
    graph::{
        descriptors::*, InputSlotRef, LstmParams, Operation, OutputSlotRef, QuantizedLstmParams,
    },
    schema::{
        ConstTensorRecord, Convolution2dRecord, LayerRecord, LstmInputParamsRecord, LstmRecord,
        OriginsRecord, SerializedGraph,
    },
    tensor::{
        check_permutation, output_shape_of_reshape, to_const_view, to_tensor_info, ConstTensor,
        TensorShape,
    },
};

/// Copies a mandatory constant out of the buffer.
fn constant(record: Option<&ConstTensorRecord<'_>>, name: &'static str) -> Result<ConstTensor> {
    to_const_view(record, name).map(ConstTensor::from)
}

/// Copies a constant that is only present when `enabled` holds.
fn constant_if(
    enabled: bool,
    record: Option<&ConstTensorRecord<'_>>,
    name: &'static str,
) -> Result<Option<ConstTensor>> {
    enabled.then(|| constant(record, name)).transpose()
}

/// Splits a flattened list into `(first, second)` pairs.
fn pairs(values: &[u32], what: &str) -> Result<Vec<(u32, u32)>> {
    if values.len() % 2 != 0 {
        return Err(DeserializeError::invalid_parameter(format!(
            "{what} must hold pairs, got {} values",
            values.len()
        )));
    }
    Ok(values.iter().copied().tuples().collect())
}

fn origins_descriptor(record: &OriginsRecord) -> Result<OriginsDescriptor> {
    if record.view_origins.len() != record.num_views as usize {
        return Err(DeserializeError::invalid_parameter(format!(
            "{} view origins for {} views",
            record.view_origins.len(),
            record.num_views
        )));
    }
    if let Some(origin) = record
        .view_origins
        .iter()
        .find(|origin| origin.len() != record.num_dimensions as usize)
    {
        return Err(DeserializeError::invalid_parameter(format!(
            "view origin {origin:?} does not have {} dimensions",
            record.num_dimensions
        )));
    }
    Ok(OriginsDescriptor {
        concat_axis: record.concat_axis,
        num_dimensions: record.num_dimensions,
        view_origins: record.view_origins.clone(),
    })
}

fn convolution2d_descriptor(record: &Convolution2dRecord) -> Result<Convolution2dDescriptor> {
    Ok(Convolution2dDescriptor {
        pad_left: record.pad_left,
        pad_right: record.pad_right,
        pad_top: record.pad_top,
        pad_bottom: record.pad_bottom,
        stride_x: record.stride_x,
        stride_y: record.stride_y,
        dilation_x: record.dilation_x,
        dilation_y: record.dilation_y,
        bias_enabled: record.bias_enabled,
        data_layout: DataLayout::decode(record.data_layout)?,
    })
}

/// Which optional LSTM tensors a layer carries, and when cell-to-input weights are read.
struct LstmFeatures {
    cifg_enabled: bool,
    peephole_enabled: bool,
    projection_enabled: bool,
    layer_norm_enabled: bool,
    /// Cell-to-input weights belong to the CIFG group rather than to the peephole group.
    cell_to_input_with_cifg: bool,
}

fn lstm_params(record: &LstmInputParamsRecord<'_>, features: LstmFeatures) -> Result<LstmParams> {
    let input_gate = !features.cifg_enabled;
    let peephole = features.peephole_enabled;
    let layer_norm = features.layer_norm_enabled;
    let cell_to_input_weights = if features.cell_to_input_with_cifg {
        if input_gate && !peephole {
            record
                .cell_to_input_weights
                .as_ref()
                .map(|record| constant(Some(record), "cell_to_input_weights"))
                .transpose()?
        } else {
            constant_if(
                input_gate,
                record.cell_to_input_weights.as_ref(),
                "cell_to_input_weights",
            )?
        }
    } else {
        constant_if(
            input_gate && peephole,
            record.cell_to_input_weights.as_ref(),
            "cell_to_input_weights",
        )?
    };
    Ok(LstmParams {
        input_to_forget_weights: Some(constant(
            record.input_to_forget_weights.as_ref(),
            "input_to_forget_weights",
        )?),
        input_to_cell_weights: Some(constant(
            record.input_to_cell_weights.as_ref(),
            "input_to_cell_weights",
        )?),
        input_to_output_weights: Some(constant(
            record.input_to_output_weights.as_ref(),
            "input_to_output_weights",
        )?),
        recurrent_to_forget_weights: Some(constant(
            record.recurrent_to_forget_weights.as_ref(),
            "recurrent_to_forget_weights",
        )?),
        recurrent_to_cell_weights: Some(constant(
            record.recurrent_to_cell_weights.as_ref(),
            "recurrent_to_cell_weights",
        )?),
        recurrent_to_output_weights: Some(constant(
            record.recurrent_to_output_weights.as_ref(),
            "recurrent_to_output_weights",
        )?),
        forget_gate_bias: Some(constant(record.forget_gate_bias.as_ref(), "forget_gate_bias")?),
        cell_bias: Some(constant(record.cell_bias.as_ref(), "cell_bias")?),
        output_gate_bias: Some(constant(record.output_gate_bias.as_ref(), "output_gate_bias")?),
        input_to_input_weights: constant_if(
            input_gate,
            record.input_to_input_weights.as_ref(),
            "input_to_input_weights",
        )?,
        recurrent_to_input_weights: constant_if(
            input_gate,
            record.recurrent_to_input_weights.as_ref(),
            "recurrent_to_input_weights",
        )?,
        cell_to_input_weights,
        input_gate_bias: constant_if(
            input_gate,
            record.input_gate_bias.as_ref(),
            "input_gate_bias",
        )?,
        projection_weights: constant_if(
            features.projection_enabled,
            record.projection_weights.as_ref(),
            "projection_weights",
        )?,
        projection_bias: constant_if(
            features.projection_enabled,
            record.projection_bias.as_ref(),
            "projection_bias",
        )?,
        cell_to_forget_weights: constant_if(
            peephole,
            record.cell_to_forget_weights.as_ref(),
            "cell_to_forget_weights",
        )?,
        cell_to_output_weights: constant_if(
            peephole,
            record.cell_to_output_weights.as_ref(),
            "cell_to_output_weights",
        )?,
        input_layer_norm_weights: constant_if(
            layer_norm && input_gate,
            record.input_layer_norm_weights.as_ref(),
            "input_layer_norm_weights",
        )?,
        forget_layer_norm_weights: constant_if(
            layer_norm,
            record.forget_layer_norm_weights.as_ref(),
            "forget_layer_norm_weights",
        )?,
        cell_layer_norm_weights: constant_if(
            layer_norm,
            record.cell_layer_norm_weights.as_ref(),
            "cell_layer_norm_weights",
        )?,
        output_layer_norm_weights: constant_if(
            layer_norm,
            record.output_layer_norm_weights.as_ref(),
            "output_layer_norm_weights",
        )?,
    })
}

/// Decoders for operations that carry no parameters.
macro_rules! simple_parsers {
    ($($method:ident => $operation:ident),+ $(,)?) => {
        impl Deserializer {
            $(
                pub(crate) fn $method(
                    &mut self,
                    graph: &SerializedGraph<'_>,
                    position: usize,
                ) -> Result<()> {
                    self.add_layer(graph, position, Operation::$operation)?;
                    Ok(())
                }
            )+
        }
    };
}

simple_parsers! {
    parse_addition => Addition,
    parse_cast => Cast,
    parse_dequantize => Dequantize,
    parse_division => Division,
    parse_floor => Floor,
    parse_maximum => Maximum,
    parse_merge => Merge,
    parse_minimum => Minimum,
    parse_multiplication => Multiplication,
    parse_prelu => Prelu,
    parse_quantize => Quantize,
    parse_rank => Rank,
    parse_shape => Shape,
    parse_subtraction => Subtraction,
    parse_switch => Switch,
}

impl Deserializer {
    pub(crate) fn parse_unsupported(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        Err(DeserializeError::UnsupportedLayer {
            layer_type: graph.layers[position].layer_type,
            location: location(graph, position),
        })
    }

    fn parse_legacy(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
        operation: Operation,
    ) -> Result<()> {
        warn!(
            location = %location(graph, position),
            replacement = operation.kind(),
            "decoding deprecated layer type"
        );
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_abs(&mut self, graph: &SerializedGraph<'_>, position: usize) -> Result<()> {
        record!(graph, position, Abs);
        let operation = Operation::ElementwiseUnary(ElementwiseUnaryDescriptor {
            operation: UnaryOperation::Abs,
        });
        self.parse_legacy(graph, position, operation)
    }

    pub(crate) fn parse_rsqrt(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        record!(graph, position, Rsqrt);
        let operation = Operation::ElementwiseUnary(ElementwiseUnaryDescriptor {
            operation: UnaryOperation::Rsqrt,
        });
        self.parse_legacy(graph, position, operation)
    }

    pub(crate) fn parse_equal(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        record!(graph, position, Equal);
        let operation = Operation::Comparison(ComparisonDescriptor {
            operation: ComparisonOperation::Equal,
        });
        self.parse_legacy(graph, position, operation)
    }

    pub(crate) fn parse_greater(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        record!(graph, position, Greater);
        let operation = Operation::Comparison(ComparisonDescriptor {
            operation: ComparisonOperation::Greater,
        });
        self.parse_legacy(graph, position, operation)
    }

    pub(crate) fn parse_resize_bilinear(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, ResizeBilinear);
        let record = &layer.descriptor;
        let operation = Operation::Resize(ResizeDescriptor {
            target_width: record.target_width,
            target_height: record.target_height,
            method: ResizeMethod::Bilinear,
            data_layout: DataLayout::decode(record.data_layout)?,
            align_corners: record.align_corners,
            half_pixel_centers: record.half_pixel_centers,
        });
        self.parse_legacy(graph, position, operation)
    }

    pub(crate) fn parse_activation(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Activation);
        let record = &layer.descriptor;
        let descriptor = ActivationDescriptor {
            function: ActivationFunction::decode(record.activation_function)?,
            a: record.a,
            b: record.b,
        };
        self.add_layer(graph, position, Operation::Activation(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_arg_min_max(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, ArgMinMax);
        let descriptor = ArgMinMaxDescriptor {
            function: ArgMinMaxFunction::decode(layer.descriptor.arg_min_max_function)?,
            axis: layer.descriptor.axis,
        };
        self.add_layer(graph, position, Operation::ArgMinMax(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_batch_normalization(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, BatchNormalization);
        let operation = Operation::BatchNormalization {
            descriptor: BatchNormalizationDescriptor {
                eps: layer.descriptor.eps,
                data_layout: DataLayout::decode(layer.descriptor.data_layout)?,
            },
            mean: constant(layer.mean.as_ref(), "mean")?,
            variance: constant(layer.variance.as_ref(), "variance")?,
            beta: constant(layer.beta.as_ref(), "beta")?,
            gamma: constant(layer.gamma.as_ref(), "gamma")?,
        };
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_batch_to_space_nd(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, BatchToSpaceNd);
        let record = &layer.descriptor;
        let descriptor = SpaceBatchDescriptor {
            block_shape: record.block_shape.clone(),
            pairs: pairs(&record.crops, "crops")?,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        self.add_layer(graph, position, Operation::BatchToSpaceNd(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_space_to_batch_nd(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, SpaceToBatchNd);
        let record = &layer.descriptor;
        let descriptor = SpaceBatchDescriptor {
            block_shape: record.block_shape.clone(),
            pairs: pairs(&record.pad_list, "pad list")?,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        self.add_layer(graph, position, Operation::SpaceToBatchNd(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_channel_shuffle(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, ChannelShuffle);
        let descriptor = ChannelShuffleDescriptor {
            axis: layer.descriptor.axis,
            num_groups: layer.descriptor.num_groups,
        };
        self.add_layer(graph, position, Operation::ChannelShuffle(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_comparison(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Comparison);
        let descriptor = ComparisonDescriptor {
            operation: ComparisonOperation::decode(layer.descriptor.operation)?,
        };
        self.add_layer(graph, position, Operation::Comparison(descriptor))?;
        Ok(())
    }

    /// Handles both the current concat tag and the legacy merger tag.
    pub(crate) fn parse_concat(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Concat | Merger);
        let operation = Operation::Concat(origins_descriptor(&layer.descriptor)?);
        if matches!(graph.layers[position].layer, LayerRecord::Merger(_)) {
            return self.parse_legacy(graph, position, operation);
        }
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_constant(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Constant);
        let tensor = constant(layer.input.as_ref(), "input")?;
        self.add_layer(graph, position, Operation::Constant(tensor))?;
        Ok(())
    }

    pub(crate) fn parse_convolution2d(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Convolution2d);
        let descriptor = convolution2d_descriptor(&layer.descriptor)?;
        let operation = Operation::Convolution2d {
            weights: constant(layer.weights.as_ref(), "weights")?,
            biases: constant_if(descriptor.bias_enabled, layer.biases.as_ref(), "biases")?,
            descriptor,
        };
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_convolution3d(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Convolution3d);
        let record = &layer.descriptor;
        let descriptor = Convolution3dDescriptor {
            pad_left: record.pad_left,
            pad_right: record.pad_right,
            pad_top: record.pad_top,
            pad_bottom: record.pad_bottom,
            pad_front: record.pad_front,
            pad_back: record.pad_back,
            stride_x: record.stride_x,
            stride_y: record.stride_y,
            stride_z: record.stride_z,
            dilation_x: record.dilation_x,
            dilation_y: record.dilation_y,
            dilation_z: record.dilation_z,
            bias_enabled: record.bias_enabled,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        self.add_layer(graph, position, Operation::Convolution3d(descriptor))?;
        Ok(())
    }

    /// Weights written before the weights layout change are stored `[M, I, H, W]` and are brought
    /// to `[1, H, W, I * M]`.
    pub(crate) fn parse_depthwise_convolution2d(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, DepthwiseConvolution2d);
        let descriptor = convolution2d_descriptor(&layer.descriptor)?;
        let mut weights = constant(layer.weights.as_ref(), "weights")?;
        if self.features.weights_layout_scheme == 0 {
            let dims = weights.info().shape().dims();
            if dims.len() != 4 {
                return Err(DeserializeError::shape_mismatch(format!(
                    "depthwise weights must have rank 4, got {dims:?}"
                )));
            }
            let permuted = weights.permuted(&[3, 2, 0, 1])?;
            let [h, w, i, m] = [0, 1, 2, 3].map(|axis| permuted.info().shape().dims()[axis]);
            let channels = i.checked_mul(m).ok_or_else(|| {
                DeserializeError::shape_mismatch(format!("depthwise weights {dims:?} overflow"))
            })?;
            weights = permuted.reshaped(vec![1, h, w, channels])?;
        }
        let operation = Operation::DepthwiseConvolution2d {
            biases: constant_if(descriptor.bias_enabled, layer.biases.as_ref(), "biases")?,
            weights,
            descriptor,
        };
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_transpose_convolution2d(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, TransposeConvolution2d);
        let record = &layer.descriptor;
        let descriptor = TransposeConvolution2dDescriptor {
            pad_left: record.pad_left,
            pad_right: record.pad_right,
            pad_top: record.pad_top,
            pad_bottom: record.pad_bottom,
            stride_x: record.stride_x,
            stride_y: record.stride_y,
            bias_enabled: record.bias_enabled,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        let operation = Operation::TransposeConvolution2d {
            weights: constant(layer.weights.as_ref(), "weights")?,
            biases: constant_if(descriptor.bias_enabled, layer.biases.as_ref(), "biases")?,
            descriptor,
        };
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_depth_to_space(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, DepthToSpace);
        let descriptor = BlockDescriptor {
            block_size: layer.descriptor.block_size,
            data_layout: DataLayout::decode(layer.descriptor.data_layout)?,
        };
        self.add_layer(graph, position, Operation::DepthToSpace(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_space_to_depth(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, SpaceToDepth);
        let descriptor = BlockDescriptor {
            block_size: layer.descriptor.block_size,
            data_layout: DataLayout::decode(layer.descriptor.data_layout)?,
        };
        self.add_layer(graph, position, Operation::SpaceToDepth(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_detection_post_process(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, DetectionPostProcess);
        let record = &layer.descriptor;
        let descriptor = DetectionPostProcessDescriptor {
            max_detections: record.max_detections,
            max_classes_per_detection: record.max_classes_per_detection,
            detections_per_class: record.detections_per_class,
            nms_score_threshold: record.nms_score_threshold,
            nms_iou_threshold: record.nms_iou_threshold,
            num_classes: record.num_classes,
            use_regular_nms: record.use_regular_nms,
            scale_x: record.scale_x,
            scale_y: record.scale_y,
            scale_w: record.scale_w,
            scale_h: record.scale_h,
        };
        let operation = Operation::DetectionPostProcess {
            descriptor,
            anchors: constant(layer.anchors.as_ref(), "anchors")?,
        };
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_elementwise_unary(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, ElementwiseUnary);
        let descriptor = ElementwiseUnaryDescriptor {
            operation: UnaryOperation::decode(layer.descriptor.operation)?,
        };
        self.add_layer(graph, position, Operation::ElementwiseUnary(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_fill(&mut self, graph: &SerializedGraph<'_>, position: usize) -> Result<()> {
        let layer = record!(graph, position, Fill);
        let descriptor = FillDescriptor {
            value: layer.descriptor.value,
        };
        self.add_layer(graph, position, Operation::Fill(descriptor))?;
        Ok(())
    }

    /// Graphs written before constant tensors became regular inputs embed the weights and biases
    /// in the layer. They are turned into constant nodes wired straight to input slots 1 and 2.
    pub(crate) fn parse_fully_connected(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, FullyConnected);
        let descriptor = FullyConnectedDescriptor {
            bias_enabled: layer.descriptor.bias_enabled,
            transpose_weight_matrix: layer.descriptor.transpose_weights_matrix,
            constant_weights: layer.descriptor.constant_weights,
        };
        if self.features.constant_tensors_as_inputs > 0 {
            self.add_layer(graph, position, Operation::FullyConnected(descriptor))?;
            return Ok(());
        }

        let weights = constant(layer.weights.as_ref(), "weights")?;
        let biases = constant_if(descriptor.bias_enabled, layer.biases.as_ref(), "biases")?;
        let ignored: &[usize] = if biases.is_some() { &[1, 2] } else { &[1] };
        let node = self.add_layer_ignoring(
            graph,
            position,
            Operation::FullyConnected(descriptor),
            ignored,
        )?;
        let name = &layer.base.name;
        let embedded = [("weights", Some(weights)), ("biases", biases)];
        for (slot, (suffix, tensor)) in embedded.into_iter().enumerate() {
            let Some(tensor) = tensor else { continue };
            let info = tensor.info().clone();
            let constant_node = self
                .network
                .add_node(format!("{name}_{suffix}"), Operation::Constant(tensor));
            let produced = OutputSlotRef::new(constant_node, 0);
            self.network.set_tensor_info(produced, info)?;
            self.network
                .connect(produced, InputSlotRef::new(node, slot + 1))?;
        }
        Ok(())
    }

    pub(crate) fn parse_gather(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Gather);
        let descriptor = GatherDescriptor {
            axis: layer.descriptor.axis,
        };
        self.add_layer(graph, position, Operation::Gather(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_instance_normalization(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, InstanceNormalization);
        let record = &layer.descriptor;
        let descriptor = InstanceNormalizationDescriptor {
            gamma: record.gamma,
            beta: record.beta,
            eps: record.eps,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        self.add_layer(graph, position, Operation::InstanceNormalization(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_l2_normalization(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, L2Normalization);
        let descriptor = L2NormalizationDescriptor {
            eps: layer.descriptor.eps,
            data_layout: DataLayout::decode(layer.descriptor.data_layout)?,
        };
        self.add_layer(graph, position, Operation::L2Normalization(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_logical_binary(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, LogicalBinary);
        let descriptor = LogicalBinaryDescriptor {
            operation: LogicalBinaryOperation::decode(layer.descriptor.operation)?,
        };
        self.add_layer(graph, position, Operation::LogicalBinary(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_softmax(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Softmax);
        let descriptor = SoftmaxDescriptor {
            beta: layer.descriptor.beta,
            axis: layer.descriptor.axis,
        };
        self.add_layer(graph, position, Operation::Softmax(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_log_softmax(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, LogSoftmax);
        let descriptor = SoftmaxDescriptor {
            beta: layer.descriptor.beta,
            axis: layer.descriptor.axis,
        };
        self.add_layer(graph, position, Operation::LogSoftmax(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_lstm(&mut self, graph: &SerializedGraph<'_>, position: usize) -> Result<()> {
        let layer = record!(graph, position, Lstm);
        let descriptor = lstm_descriptor(&layer.descriptor);
        let params = lstm_params(
            &layer.input_params,
            LstmFeatures {
                cifg_enabled: descriptor.cifg_enabled,
                peephole_enabled: descriptor.peephole_enabled,
                projection_enabled: descriptor.projection_enabled,
                layer_norm_enabled: descriptor.layer_norm_enabled,
                cell_to_input_with_cifg: true,
            },
        )?;
        let operation = Operation::Lstm {
            descriptor,
            params: Box::new(params),
        };
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_unidirectional_sequence_lstm(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, UnidirectionalSequenceLstm);
        let descriptor = lstm_descriptor(&layer.descriptor);
        let params = lstm_params(
            &layer.input_params,
            LstmFeatures {
                cifg_enabled: descriptor.cifg_enabled,
                peephole_enabled: descriptor.peephole_enabled,
                projection_enabled: descriptor.projection_enabled,
                layer_norm_enabled: descriptor.layer_norm_enabled,
                cell_to_input_with_cifg: false,
            },
        )?;
        let operation = Operation::UnidirectionalSequenceLstm {
            descriptor,
            params: Box::new(params),
        };
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_qlstm(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, QLstm);
        let record = &layer.descriptor;
        let descriptor = QLstmDescriptor {
            cifg_enabled: record.cifg_enabled,
            peephole_enabled: record.peephole_enabled,
            projection_enabled: record.projection_enabled,
            layer_norm_enabled: record.layer_norm_enabled,
            cell_clip: record.cell_clip,
            projection_clip: record.projection_clip,
            input_intermediate_scale: record.input_intermediate_scale,
            forget_intermediate_scale: record.forget_intermediate_scale,
            cell_intermediate_scale: record.cell_intermediate_scale,
            output_intermediate_scale: record.output_intermediate_scale,
            hidden_state_zero_point: record.hidden_state_zero_point,
            hidden_state_scale: record.hidden_state_scale,
        };
        let params = lstm_params(
            &layer.input_params,
            LstmFeatures {
                cifg_enabled: descriptor.cifg_enabled,
                peephole_enabled: descriptor.peephole_enabled,
                projection_enabled: descriptor.projection_enabled,
                layer_norm_enabled: descriptor.layer_norm_enabled,
                cell_to_input_with_cifg: false,
            },
        )?;
        let operation = Operation::QLstm {
            descriptor,
            params: Box::new(params),
        };
        self.add_layer(graph, position, operation)?;
        Ok(())
    }

    pub(crate) fn parse_quantized_lstm(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, QuantizedLstm);
        let record = &layer.input_params;
        let params = QuantizedLstmParams {
            input_to_input_weights: constant(
                record.input_to_input_weights.as_ref(),
                "input_to_input_weights",
            )?,
            input_to_forget_weights: constant(
                record.input_to_forget_weights.as_ref(),
                "input_to_forget_weights",
            )?,
            input_to_cell_weights: constant(
                record.input_to_cell_weights.as_ref(),
                "input_to_cell_weights",
            )?,
            input_to_output_weights: constant(
                record.input_to_output_weights.as_ref(),
                "input_to_output_weights",
            )?,
            recurrent_to_input_weights: constant(
                record.recurrent_to_input_weights.as_ref(),
                "recurrent_to_input_weights",
            )?,
            recurrent_to_forget_weights: constant(
                record.recurrent_to_forget_weights.as_ref(),
                "recurrent_to_forget_weights",
            )?,
            recurrent_to_cell_weights: constant(
                record.recurrent_to_cell_weights.as_ref(),
                "recurrent_to_cell_weights",
            )?,
            recurrent_to_output_weights: constant(
                record.recurrent_to_output_weights.as_ref(),
                "recurrent_to_output_weights",
            )?,
            input_gate_bias: constant(record.input_gate_bias.as_ref(), "input_gate_bias")?,
            forget_gate_bias: constant(record.forget_gate_bias.as_ref(), "forget_gate_bias")?,
            cell_bias: constant(record.cell_bias.as_ref(), "cell_bias")?,
            output_gate_bias: constant(record.output_gate_bias.as_ref(), "output_gate_bias")?,
        };
        self.add_layer(graph, position, Operation::QuantizedLstm(Box::new(params)))?;
        Ok(())
    }

    pub(crate) fn parse_mean(&mut self, graph: &SerializedGraph<'_>, position: usize) -> Result<()> {
        let layer = record!(graph, position, Mean);
        let descriptor = ReduceDescriptor {
            axis: layer.descriptor.axis.clone(),
            keep_dims: layer.descriptor.keep_dims,
            operation: ReduceOperation::Mean,
        };
        self.add_layer(graph, position, Operation::Mean(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_reduce(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Reduce);
        let descriptor = ReduceDescriptor {
            axis: layer.descriptor.axis.clone(),
            keep_dims: layer.descriptor.keep_dims,
            operation: ReduceOperation::decode(layer.descriptor.reduce_operation)?,
        };
        self.add_layer(graph, position, Operation::Reduce(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_normalization(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Normalization);
        let record = &layer.descriptor;
        let descriptor = NormalizationDescriptor {
            channel_type: NormalizationAlgorithmChannel::decode(record.norm_channel_type)?,
            method_type: NormalizationAlgorithmMethod::decode(record.norm_method_type)?,
            norm_size: record.norm_size,
            alpha: record.alpha,
            beta: record.beta,
            k: record.k,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        self.add_layer(graph, position, Operation::Normalization(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_pad(&mut self, graph: &SerializedGraph<'_>, position: usize) -> Result<()> {
        let layer = record!(graph, position, Pad);
        let record = &layer.descriptor;
        let descriptor = PadDescriptor {
            pad_list: pairs(&record.pad_list, "pad list")?,
            pad_value: record.pad_value,
            padding_mode: PaddingMode::decode(record.padding_mode)?,
        };
        self.add_layer(graph, position, Operation::Pad(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_permute(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Permute);
        let mappings = &layer.descriptor.dim_mappings;
        check_permutation(mappings, mappings.len())?;
        let descriptor = PermutationDescriptor {
            dim_mappings: mappings.clone(),
        };
        self.add_layer(graph, position, Operation::Permute(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_transpose(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Transpose);
        let mappings = &layer.descriptor.dim_mappings;
        check_permutation(mappings, mappings.len())?;
        let descriptor = PermutationDescriptor {
            dim_mappings: mappings.clone(),
        };
        self.add_layer(graph, position, Operation::Transpose(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_pooling2d(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Pooling2d);
        let record = &layer.descriptor;
        let descriptor = Pooling2dDescriptor {
            pool_type: PoolingAlgorithm::decode(record.pool_type)?,
            pad_left: record.pad_left,
            pad_right: record.pad_right,
            pad_top: record.pad_top,
            pad_bottom: record.pad_bottom,
            pool_width: record.pool_width,
            pool_height: record.pool_height,
            stride_x: record.stride_x,
            stride_y: record.stride_y,
            output_shape_rounding: OutputShapeRounding::decode(record.output_shape_rounding)?,
            padding_method: PaddingMethod::decode(record.padding_method)?,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        self.add_layer(graph, position, Operation::Pooling2d(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_pooling3d(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Pooling3d);
        let record = &layer.descriptor;
        let descriptor = Pooling3dDescriptor {
            pool_type: PoolingAlgorithm::decode(record.pool_type)?,
            pad_left: record.pad_left,
            pad_right: record.pad_right,
            pad_top: record.pad_top,
            pad_bottom: record.pad_bottom,
            pad_front: record.pad_front,
            pad_back: record.pad_back,
            pool_width: record.pool_width,
            pool_height: record.pool_height,
            pool_depth: record.pool_depth,
            stride_x: record.stride_x,
            stride_y: record.stride_y,
            stride_z: record.stride_z,
            output_shape_rounding: OutputShapeRounding::decode(record.output_shape_rounding)?,
            padding_method: PaddingMethod::decode(record.padding_method)?,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        self.add_layer(graph, position, Operation::Pooling3d(descriptor))?;
        Ok(())
    }

    /// The output descriptor is the one inferred from the input and the target shape; a declared
    /// descriptor that disagrees is rejected in strict mode.
    pub(crate) fn parse_reshape(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Reshape);
        Self::check_arity(graph, position, 1, 1)?;
        let inputs = Self::input_infos(graph, position)?;
        let target = &layer.descriptor.target_shape;
        let inferred = output_shape_of_reshape(&inputs[0], target)?;

        let declared = to_tensor_info(layer.base.output_slots[0].tensor_info.as_ref())?;
        if self.options.strict_shape_check
            && declared.shape().is_fully_specified()
            && declared.shape().dims() != inferred.shape().dims()
        {
            return Err(DeserializeError::shape_mismatch(format!(
                "target shape {target:?} resolves to {:?} but the output is declared as {:?}",
                inferred.shape().dims(),
                declared.shape().dims()
            )));
        }

        let descriptor = ReshapeDescriptor {
            target_shape: inferred.shape().clone(),
        };
        let node = self.add_layer(graph, position, Operation::Reshape(descriptor))?;
        self.network
            .set_tensor_info(OutputSlotRef::new(node, 0), inferred)?;
        Ok(())
    }

    pub(crate) fn parse_resize(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Resize);
        let record = &layer.descriptor;
        let descriptor = ResizeDescriptor {
            target_width: record.target_width,
            target_height: record.target_height,
            method: ResizeMethod::decode(record.method)?,
            data_layout: DataLayout::decode(record.data_layout)?,
            align_corners: record.align_corners,
            half_pixel_centers: record.half_pixel_centers,
        };
        self.add_layer(graph, position, Operation::Resize(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_slice(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Slice);
        let record = &layer.descriptor;
        if record.begin.len() != record.size.len() {
            return Err(DeserializeError::invalid_parameter(format!(
                "slice begin has {} entries but size has {}",
                record.begin.len(),
                record.size.len()
            )));
        }
        let descriptor = SliceDescriptor {
            begin: record.begin.clone(),
            size: record.size.clone(),
        };
        self.add_layer(graph, position, Operation::Slice(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_splitter(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Splitter);
        let record = &layer.descriptor;
        let origins = origins_descriptor(&record.origins)?;
        if record.view_sizes.len() != origins.num_views() {
            return Err(DeserializeError::invalid_parameter(format!(
                "{} view sizes for {} views",
                record.view_sizes.len(),
                origins.num_views()
            )));
        }
        if let Some(size) = record
            .view_sizes
            .iter()
            .find(|size| size.len() != origins.num_dimensions as usize)
        {
            return Err(DeserializeError::invalid_parameter(format!(
                "view size {size:?} does not have {} dimensions",
                origins.num_dimensions
            )));
        }
        let descriptor = ViewsDescriptor {
            origins,
            view_sizes: record.view_sizes.clone(),
        };
        self.add_layer(graph, position, Operation::Splitter(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_stack(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, Stack);
        let record = &layer.descriptor;
        let input_shape = TensorShape::new(record.input_shape.clone());
        Self::check_arity(graph, position, record.num_inputs as usize, 1)?;
        for info in Self::input_infos(graph, position)? {
            if info.shape().dims() != input_shape.dims() {
                return Err(DeserializeError::shape_mismatch(format!(
                    "stack input has shape {:?}, expected {:?}",
                    info.shape().dims(),
                    input_shape.dims()
                )));
            }
        }
        let descriptor = StackDescriptor {
            axis: record.axis,
            num_inputs: record.num_inputs,
            input_shape,
        };
        self.add_layer(graph, position, Operation::Stack(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_stand_in(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, StandIn);
        let descriptor = StandInDescriptor {
            num_inputs: layer.descriptor.num_inputs,
            num_outputs: layer.descriptor.num_outputs,
        };
        self.add_layer(graph, position, Operation::StandIn(descriptor))?;
        Ok(())
    }

    pub(crate) fn parse_strided_slice(
        &mut self,
        graph: &SerializedGraph<'_>,
        position: usize,
    ) -> Result<()> {
        let layer = record!(graph, position, StridedSlice);
        let record = &layer.descriptor;
        if record.begin.len() != record.end.len() || record.begin.len() != record.stride.len() {
            return Err(DeserializeError::invalid_parameter(format!(
                "strided slice begin, end and stride have {}, {} and {} entries",
                record.begin.len(),
                record.end.len(),
                record.stride.len()
            )));
        }
        let descriptor = StridedSliceDescriptor {
            begin: record.begin.clone(),
            end: record.end.clone(),
            stride: record.stride.clone(),
            begin_mask: record.begin_mask,
            end_mask: record.end_mask,
            shrink_axis_mask: record.shrink_axis_mask,
            ellipsis_mask: record.ellipsis_mask,
            new_axis_mask: record.new_axis_mask,
            data_layout: DataLayout::decode(record.data_layout)?,
        };
        self.add_layer(graph, position, Operation::StridedSlice(descriptor))?;
        Ok(())
    }
}

fn lstm_descriptor(record: &LstmRecord) -> LstmDescriptor {
    LstmDescriptor {
        activation_func: record.activation_func,
        clipping_thres_cell: record.clipping_thres_cell,
        clipping_thres_proj: record.clipping_thres_proj,
        cifg_enabled: record.cifg_enabled,
        peephole_enabled: record.peephole_enabled,
        projection_enabled: record.projection_enabled,
        layer_norm_enabled: record.layer_norm_enabled,
        time_major: record.time_major,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        deserializer::DeserializerOptions,
        error::{LayerLocation, SlotKind},
        graph::Network,
        schema::{
            ActivationLayer, ActivationRecord, ConcatLayer, ConstantLayer,
            DepthwiseConvolution2dLayer, DetectionPostProcessLayer, DetectionPostProcessRecord, FeatureVersions, FullyConnectedLayer,
            FullyConnectedRecord, LayerBase, LstmLayer, PadLayer, PadRecord, PermutationRecord,
            PermuteLayer, QLstmLayer, QLstmRecord, ReshapeLayer, ReshapeRecord,
            ResizeBilinearLayer, ResizeBilinearRecord, SliceLayer, SliceRecord, SplitterLayer,
            StackLayer, StackRecord, ViewsRecord,
        },
        testing::{build, const_record, f32_bytes, node_named, GraphFixture},
    };

    fn operation<'n>(network: &'n Network, name: &str) -> &'n Operation {
        network
            .node(node_named(network, name))
            .map(|node| node.operation())
            .expect("named node exists")
    }

    fn reshape_graph(target_shape: Vec<i32>, declared: &[u32]) -> GraphFixture<'static> {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[9]);
        let reshape = fixture.single("reshape", &[input], declared, |base| {
            LayerRecord::Reshape(ReshapeLayer {
                base,
                descriptor: ReshapeRecord { target_shape },
            })
        });
        fixture.output("out", reshape);
        fixture
    }

    #[test]
    fn test_reshape_output_is_inferred() -> anyhow::Result<()> {
        let mut deserializer = Deserializer::new();
        let network = build(&mut deserializer, &reshape_graph(vec![3, -1], &[3, 3]))?;
        let reshape = node_named(&network, "reshape");
        let info = network
            .tensor_info(OutputSlotRef::new(reshape, 0))
            .expect("reshape output has a descriptor");
        assert_eq!(info.shape().dims(), &[3, 3]);
        assert!(matches!(
            operation(&network, "reshape"),
            Operation::Reshape(descriptor) if descriptor.target_shape.dims() == [3, 3]
        ));
        Ok(())
    }

    #[test]
    fn test_reshape_declared_shape_disagrees() -> anyhow::Result<()> {
        let fixture = reshape_graph(vec![3, -1], &[9, 1]);
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(err, DeserializeError::ShapeMismatch { .. }));
        assert_eq!(err.location().map(|l| l.name.as_str()), Some("reshape"));

        let mut lenient = Deserializer::with_options(DeserializerOptions {
            strict_shape_check: false,
            ..Default::default()
        });
        let network = build(&mut lenient, &fixture)?;
        let reshape = node_named(&network, "reshape");
        let info = network
            .tensor_info(OutputSlotRef::new(reshape, 0))
            .expect("reshape output has a descriptor");
        assert_eq!(info.shape().dims(), &[3, 3]);
        Ok(())
    }

    #[test]
    fn test_reshape_errors_name_the_layer() {
        let fixture = reshape_graph(vec![-1, -1], &[3, 3]);
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(err, DeserializeError::MultipleWildcards { .. }));
        assert_eq!(err.location(), Some(&LayerLocation::new(1, "reshape")));

        let target = vec![65536, 65536, 65536, 65536, -1];
        let err = build(&mut Deserializer::new(), &reshape_graph(target, &[9])).unwrap_err();
        assert!(matches!(err, DeserializeError::ShapeMismatch { .. }));
        assert_eq!(err.location(), Some(&LayerLocation::new(1, "reshape")));
    }

    #[test]
    fn test_reshape_cannot_change_element_count() {
        let mut lenient = Deserializer::with_options(DeserializerOptions {
            strict_shape_check: false,
            ..Default::default()
        });
        let err = build(&mut lenient, &reshape_graph(vec![2, 2], &[2, 2])).unwrap_err();
        assert!(matches!(err, DeserializeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_constant_with_overflowing_shape() {
        let mut fixture = GraphFixture::new();
        fixture.single("huge", &[], &[1], |base| {
            LayerRecord::Constant(ConstantLayer {
                base,
                input: Some(const_record(&[u32::MAX; 3], &[])),
            })
        });
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(err, DeserializeError::MalformedTensor { .. }));
        assert_eq!(err.location(), Some(&LayerLocation::new(0, "huge")));
    }

    fn detection_graph<'a>(anchors: &'a [u8], inputs: usize) -> GraphFixture<'a> {
        let mut fixture = GraphFixture::new();
        let boxes = fixture.input("boxes", &[1, 2, 4]);
        let scores = fixture.input("scores", &[1, 2, 3]);
        let sources = [boxes, scores];
        let outputs = fixture.layer(
            "detect",
            &sources[..inputs],
            &[&[1, 5, 4], &[1, 5], &[1, 5], &[1]],
            |base| {
                LayerRecord::DetectionPostProcess(DetectionPostProcessLayer {
                    base,
                    descriptor: DetectionPostProcessRecord {
                        max_detections: 5,
                        num_classes: 2,
                        nms_iou_threshold: 0.5,
                        ..Default::default()
                    },
                    anchors: Some(const_record(&[2, 4], anchors)),
                })
            },
        );
        fixture.output("detections", outputs[3]);
        fixture
    }

    #[test]
    fn test_detection_post_process() -> anyhow::Result<()> {
        let anchors = f32_bytes(&[0.5; 8]);
        let network = build(&mut Deserializer::new(), &detection_graph(&anchors, 2))?;
        let detect = node_named(&network, "detect");
        let boxes = node_named(&network, "boxes");
        assert_eq!(
            network.producer_of(InputSlotRef::new(detect, 0)),
            Some(OutputSlotRef::new(boxes, 0))
        );
        match operation(&network, "detect") {
            Operation::DetectionPostProcess {
                descriptor,
                anchors: tensor,
            } => {
                assert_eq!(descriptor.max_detections, 5);
                assert_eq!(tensor.info().shape().dims(), &[2, 4]);
                assert_eq!(tensor.bytes(), &anchors[..]);
            }
            other => panic!("unexpected operation {}", other.kind()),
        }

        let err = build(&mut Deserializer::new(), &detection_graph(&anchors, 1)).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::Arity {
                kind: SlotKind::Input,
                expected: 2,
                actual: 1,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_fully_connected_embedded_constants_become_nodes() -> anyhow::Result<()> {
        let weights = f32_bytes(&[1.0; 8]);
        let biases = f32_bytes(&[0.5, -0.5]);
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        let fc = fixture.single("fc", &[input], &[1, 2], |base| {
            LayerRecord::FullyConnected(FullyConnectedLayer {
                base,
                descriptor: FullyConnectedRecord {
                    bias_enabled: true,
                    transpose_weights_matrix: false,
                    constant_weights: true,
                },
                weights: Some(const_record(&[4, 2], &weights)),
                biases: Some(const_record(&[2], &biases)),
            })
        });
        fixture.output("out", fc);

        let network = build(&mut Deserializer::new(), &fixture)?;
        assert_eq!(network.len(), 5);
        let fc = node_named(&network, "fc");
        for (slot, name) in [(1, "fc_weights"), (2, "fc_biases")] {
            let constant = node_named(&network, name);
            assert_eq!(
                network.producer_of(InputSlotRef::new(fc, slot)),
                Some(OutputSlotRef::new(constant, 0))
            );
            assert!(matches!(operation(&network, name), Operation::Constant(_)));
        }
        let Operation::Constant(tensor) = operation(&network, "fc_biases") else {
            unreachable!()
        };
        assert_eq!(tensor.bytes(), &biases[..]);
        assert!(tensor.info().is_constant());
        Ok(())
    }

    #[test]
    fn test_fully_connected_weights_as_inputs() -> anyhow::Result<()> {
        let weights = f32_bytes(&[1.0; 8]);
        let mut fixture = GraphFixture::new();
        fixture.graph.feature_versions = Some(FeatureVersions {
            constant_tensors_as_inputs: 1,
            ..Default::default()
        });
        let input = fixture.input("in", &[1, 4]);
        let w = fixture.single("w", &[], &[4, 2], |base| {
            LayerRecord::Constant(ConstantLayer {
                base,
                input: Some(const_record(&[4, 2], &weights)),
            })
        });
        let fc = fixture.single("fc", &[input, w], &[1, 2], |base| {
            LayerRecord::FullyConnected(FullyConnectedLayer {
                base,
                descriptor: FullyConnectedRecord::default(),
                ..Default::default()
            })
        });
        fixture.output("out", fc);

        let network = build(&mut Deserializer::new(), &fixture)?;
        assert_eq!(network.len(), 4);
        let fc = node_named(&network, "fc");
        let w = node_named(&network, "w");
        assert_eq!(
            network.producer_of(InputSlotRef::new(fc, 1)),
            Some(OutputSlotRef::new(w, 0))
        );
        Ok(())
    }

    fn depthwise_weights(features: Option<FeatureVersions>) -> anyhow::Result<ConstTensor> {
        // [M = 2, I = 1, H = 1, W = 3]
        let weights = f32_bytes(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut fixture = GraphFixture::new();
        fixture.graph.feature_versions = features;
        let input = fixture.input("in", &[1, 4, 4, 1]);
        let conv = fixture.single("conv", &[input], &[1, 4, 2, 2], |base| {
            LayerRecord::DepthwiseConvolution2d(DepthwiseConvolution2dLayer {
                base,
                descriptor: Convolution2dRecord::default(),
                weights: Some(const_record(&[2, 1, 1, 3], &weights)),
                biases: None,
            })
        });
        fixture.output("out", conv);
        let network = build(&mut Deserializer::new(), &fixture)?;
        match operation(&network, "conv") {
            Operation::DepthwiseConvolution2d { weights, .. } => Ok(weights.clone()),
            other => anyhow::bail!("unexpected operation {}", other.kind()),
        }
    }

    #[test]
    fn test_depthwise_weights_are_brought_to_current_layout() -> anyhow::Result<()> {
        let weights = depthwise_weights(None)?;
        assert_eq!(weights.info().shape().dims(), &[1, 1, 3, 2]);
        assert_eq!(weights.bytes(), f32_bytes(&[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]));

        let current = depthwise_weights(Some(FeatureVersions {
            weights_layout_scheme: 1,
            ..Default::default()
        }))?;
        assert_eq!(current.info().shape().dims(), &[2, 1, 1, 3]);
        assert_eq!(
            current.bytes(),
            f32_bytes(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0])
        );
        Ok(())
    }

    #[test]
    fn test_legacy_tags_map_to_current_operations() -> anyhow::Result<()> {
        let mut fixture = GraphFixture::new();
        let a = fixture.input("a", &[1, 4]);
        let b = fixture.input("b", &[1, 4]);
        fixture.single("abs", &[a], &[1, 4], LayerRecord::Abs);
        fixture.single("rsqrt", &[a], &[1, 4], LayerRecord::Rsqrt);
        fixture.single("equal", &[a, b], &[1, 4], LayerRecord::Equal);
        fixture.single("greater", &[a, b], &[1, 4], LayerRecord::Greater);
        fixture.single("resize", &[a], &[1, 4], |base| {
            LayerRecord::ResizeBilinear(ResizeBilinearLayer {
                base,
                descriptor: ResizeBilinearRecord {
                    target_width: 8,
                    target_height: 2,
                    align_corners: true,
                    ..Default::default()
                },
            })
        });
        fixture.single("merger", &[a, b], &[2, 4], |base| {
            LayerRecord::Merger(ConcatLayer {
                base,
                descriptor: OriginsRecord {
                    concat_axis: 0,
                    num_views: 2,
                    num_dimensions: 2,
                    view_origins: vec![vec![0, 0], vec![1, 0]],
                },
            })
        });

        let network = build(&mut Deserializer::new(), &fixture)?;
        let unary = |operation| Operation::ElementwiseUnary(ElementwiseUnaryDescriptor { operation });
        let comparison = |operation| Operation::Comparison(ComparisonDescriptor { operation });
        assert_eq!(operation(&network, "abs"), &unary(UnaryOperation::Abs));
        assert_eq!(operation(&network, "rsqrt"), &unary(UnaryOperation::Rsqrt));
        assert_eq!(
            operation(&network, "equal"),
            &comparison(ComparisonOperation::Equal)
        );
        assert_eq!(
            operation(&network, "greater"),
            &comparison(ComparisonOperation::Greater)
        );
        assert_eq!(
            operation(&network, "resize"),
            &Operation::Resize(ResizeDescriptor {
                target_width: 8,
                target_height: 2,
                method: ResizeMethod::Bilinear,
                data_layout: DataLayout::Nhwc,
                align_corners: true,
                half_pixel_centers: false,
            })
        );
        assert!(matches!(
            operation(&network, "merger"),
            Operation::Concat(origins) if origins.num_views() == 2
        ));
        Ok(())
    }

    #[test]
    fn test_unknown_enumeration_value() {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 4]);
        fixture.single("act", &[input], &[1, 4], |base| {
            LayerRecord::Activation(ActivationLayer {
                base,
                descriptor: ActivationRecord {
                    activation_function: 99,
                    ..Default::default()
                },
            })
        });
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(err, DeserializeError::InvalidParameter { .. }));
        assert_eq!(err.location().map(|l| l.position), Some(1));
    }

    #[test]
    fn test_inconsistent_descriptors_are_rejected() {
        let cases: [(&str, fn(LayerBase) -> LayerRecord<'static>); 4] = [
            ("odd pad list", |base| {
                LayerRecord::Pad(PadLayer {
                    base,
                    descriptor: PadRecord {
                        pad_list: vec![0, 1, 2],
                        ..Default::default()
                    },
                })
            }),
            ("repeated permutation entry", |base| {
                LayerRecord::Permute(PermuteLayer {
                    base,
                    descriptor: PermutationRecord {
                        dim_mappings: vec![0, 0],
                    },
                })
            }),
            ("slice lengths differ", |base| {
                LayerRecord::Slice(SliceLayer {
                    base,
                    descriptor: SliceRecord {
                        begin: vec![0, 0],
                        size: vec![1],
                    },
                })
            }),
            ("view sizes missing", |base| {
                LayerRecord::Splitter(SplitterLayer {
                    base,
                    descriptor: ViewsRecord {
                        origins: OriginsRecord {
                            concat_axis: 0,
                            num_views: 1,
                            num_dimensions: 2,
                            view_origins: vec![vec![0, 0]],
                        },
                        view_sizes: vec![],
                    },
                })
            }),
        ];
        for (what, make) in cases {
            let mut fixture = GraphFixture::new();
            let input = fixture.input("in", &[1, 4]);
            fixture.single("layer", &[input], &[1, 4], make);
            let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
            assert!(
                matches!(err, DeserializeError::InvalidParameter { .. }),
                "{what}: {err}"
            );
        }
    }

    #[test]
    fn test_concat_origins_must_match_views() {
        let mut fixture = GraphFixture::new();
        let a = fixture.input("a", &[1, 4]);
        let b = fixture.input("b", &[1, 4]);
        fixture.single("concat", &[a, b], &[2, 4], |base| {
            LayerRecord::Concat(ConcatLayer {
                base,
                descriptor: OriginsRecord {
                    concat_axis: 0,
                    num_views: 2,
                    num_dimensions: 2,
                    view_origins: vec![vec![0, 0], vec![1]],
                },
            })
        });
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(err, DeserializeError::InvalidParameter { .. }));
    }

    fn stack_graph(second: &[u32]) -> GraphFixture<'static> {
        let mut fixture = GraphFixture::new();
        let a = fixture.input("a", &[1, 4]);
        let b = fixture.input("b", second);
        let stack = fixture.single("stack", &[a, b], &[2, 1, 4], |base| {
            LayerRecord::Stack(StackLayer {
                base,
                descriptor: StackRecord {
                    axis: 0,
                    num_inputs: 2,
                    input_shape: vec![1, 4],
                },
            })
        });
        fixture.output("out", stack);
        fixture
    }

    #[test]
    fn test_stack_inputs_must_share_shape() -> anyhow::Result<()> {
        let network = build(&mut Deserializer::new(), &stack_graph(&[1, 4]))?;
        assert_eq!(network.len(), 4);

        let err = build(&mut Deserializer::new(), &stack_graph(&[1, 3])).unwrap_err();
        assert!(matches!(err, DeserializeError::ShapeMismatch { .. }));
        Ok(())
    }

    /// The nine tensors every LSTM variant needs, each holding four floats.
    fn mandatory_lstm_tensors(data: &[u8]) -> LstmInputParamsRecord<'_> {
        let tensor = || Some(const_record(&[4], data));
        LstmInputParamsRecord {
            input_to_forget_weights: tensor(),
            input_to_cell_weights: tensor(),
            input_to_output_weights: tensor(),
            recurrent_to_forget_weights: tensor(),
            recurrent_to_cell_weights: tensor(),
            recurrent_to_output_weights: tensor(),
            forget_gate_bias: tensor(),
            cell_bias: tensor(),
            output_gate_bias: tensor(),
            ..Default::default()
        }
    }

    fn with_input_gate(mut params: LstmInputParamsRecord<'_>) -> LstmInputParamsRecord<'_> {
        params.input_to_input_weights = params.input_to_forget_weights.clone();
        params.recurrent_to_input_weights = params.input_to_forget_weights.clone();
        params.input_gate_bias = params.input_to_forget_weights.clone();
        params
    }

    fn lstm_graph<'a>(
        descriptor: LstmRecord,
        input_params: LstmInputParamsRecord<'a>,
    ) -> GraphFixture<'a> {
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 2]);
        let state = fixture.input("output_state", &[1, 2]);
        let cell = fixture.input("cell_state", &[1, 2]);
        let outputs = fixture.layer(
            "lstm",
            &[input, state, cell],
            &[&[1, 8], &[1, 2], &[1, 2], &[1, 2]],
            |base| {
                LayerRecord::Lstm(LstmLayer {
                    base,
                    descriptor,
                    input_params,
                })
            },
        );
        fixture.output("out", outputs[3]);
        fixture
    }

    fn lstm_params_of(network: &Network) -> &LstmParams {
        match operation(network, "lstm") {
            Operation::Lstm { params, .. } => params.as_ref(),
            other => panic!("unexpected operation {}", other.kind()),
        }
    }

    #[test]
    fn test_lstm_with_cifg_skips_input_gate() -> anyhow::Result<()> {
        let data = f32_bytes(&[0.0; 4]);
        let descriptor = LstmRecord {
            cifg_enabled: true,
            ..Default::default()
        };
        let fixture = lstm_graph(descriptor, mandatory_lstm_tensors(&data));
        let network = build(&mut Deserializer::new(), &fixture)?;
        let params = lstm_params_of(&network);
        assert!(params.input_to_forget_weights.is_some());
        assert!(params.input_to_input_weights.is_none());
        assert!(params.cell_to_input_weights.is_none());
        Ok(())
    }

    #[test]
    fn test_lstm_without_cifg_needs_input_gate() {
        let data = f32_bytes(&[0.0; 4]);
        let fixture = lstm_graph(LstmRecord::default(), mandatory_lstm_tensors(&data));
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        match err {
            DeserializeError::NullConstant { tensor, location } => {
                assert_eq!(tensor, "input_to_input_weights");
                assert_eq!(location.map(|l| l.name), Some("lstm".to_string()));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_lstm_cell_to_input_weights() -> anyhow::Result<()> {
        let data = f32_bytes(&[0.0; 4]);
        let params = with_input_gate(mandatory_lstm_tensors(&data));

        // optional without peephole
        let fixture = lstm_graph(LstmRecord::default(), params.clone());
        let network = build(&mut Deserializer::new(), &fixture)?;
        assert!(lstm_params_of(&network).cell_to_input_weights.is_none());

        let mut with_cell = params.clone();
        with_cell.cell_to_input_weights = with_cell.input_to_forget_weights.clone();
        let fixture = lstm_graph(LstmRecord::default(), with_cell);
        let network = build(&mut Deserializer::new(), &fixture)?;
        assert!(lstm_params_of(&network).cell_to_input_weights.is_some());

        // mandatory with peephole
        let mut peephole = params;
        peephole.cell_to_forget_weights = peephole.input_to_forget_weights.clone();
        peephole.cell_to_output_weights = peephole.input_to_forget_weights.clone();
        let descriptor = LstmRecord {
            peephole_enabled: true,
            ..Default::default()
        };
        let fixture = lstm_graph(descriptor, peephole);
        let err = build(&mut Deserializer::new(), &fixture).unwrap_err();
        assert!(matches!(
            err,
            DeserializeError::NullConstant {
                tensor: "cell_to_input_weights",
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn test_qlstm_ignores_cell_to_input_without_peephole() -> anyhow::Result<()> {
        let data = f32_bytes(&[0.0; 4]);
        let mut params = with_input_gate(mandatory_lstm_tensors(&data));
        params.cell_to_input_weights = params.input_to_forget_weights.clone();
        let mut fixture = GraphFixture::new();
        let input = fixture.input("in", &[1, 2]);
        let state = fixture.input("output_state", &[1, 2]);
        let cell = fixture.input("cell_state", &[1, 2]);
        let outputs = fixture.layer(
            "qlstm",
            &[input, state, cell],
            &[&[1, 2], &[1, 2], &[1, 2]],
            |base| {
                LayerRecord::QLstm(QLstmLayer {
                    base,
                    descriptor: QLstmRecord::default(),
                    input_params: params,
                })
            },
        );
        fixture.output("out", outputs[2]);

        let network = build(&mut Deserializer::new(), &fixture)?;
        match operation(&network, "qlstm") {
            Operation::QLstm { params, .. } => {
                assert!(params.input_to_input_weights.is_some());
                assert!(params.cell_to_input_weights.is_none());
            }
            other => panic!("unexpected operation {}", other.kind()),
        }
        Ok(())
    }
}
