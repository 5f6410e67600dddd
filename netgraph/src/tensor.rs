//! Tensor descriptors and constant payloads, plus the conversions from their serialized records.
use itertools::Itertools;
use serde::Serialize;

use crate::{
    error::{DeserializeError, Result},
    schema::{ConstTensorRecord, TensorInfoRecord},
};

wire_enum! {
    /// Element type of a tensor. Two legacy codes are kept as aliases of their renamed
    /// successors.
    pub enum DataType: u8 {
        Float16 = 0,
        Float32 = 1,
        QAsymmU8 = 6 | 2,
        Signed32 = 3,
        Boolean = 4,
        QSymmS16 = 7 | 5,
        QAsymmS8 = 8,
        QSymmS8 = 9,
        Signed64 = 10,
    }
}

impl DataType {
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::QAsymmU8 | Self::QAsymmS8 | Self::QSymmS8 | Self::Boolean => 1,
            Self::Float16 | Self::QSymmS16 => 2,
            Self::Float32 | Self::Signed32 => 4,
            Self::Signed64 => 8,
        }
    }

    pub const fn is_quantized(self) -> bool {
        matches!(
            self,
            Self::QAsymmU8 | Self::QAsymmS8 | Self::QSymmS8 | Self::QSymmS16
        )
    }
}

wire_enum! {
    pub enum Dimensionality: u8 {
        NotSpecified = 0,
        Specified = 1,
        Scalar = 2,
    }
}

wire_enum! {
    /// Element width tag of a serialized constant data block.
    pub enum ConstTensorData: u8 {
        ByteData = 1,
        ShortData = 2,
        IntData = 3,
        LongData = 4,
    }
}

impl ConstTensorData {
    pub const fn element_width(self) -> usize {
        match self {
            Self::ByteData => 1,
            Self::ShortData => 2,
            Self::IntData => 4,
            Self::LongData => 8,
        }
    }

    /// The block tag a tensor of the given element type is serialized with.
    pub const fn for_data_type(data_type: DataType) -> Self {
        match data_type.size_in_bytes() {
            1 => Self::ByteData,
            2 => Self::ShortData,
            4 => Self::IntData,
            _ => Self::LongData,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TensorShape {
    dimensionality: Dimensionality,
    dims: Vec<u32>,
    /// Per dimension flag, `false` when the extent is only known at execution time.
    specificity: Vec<bool>,
}

impl TensorShape {
    pub fn new(dims: Vec<u32>) -> Self {
        let specificity = vec![true; dims.len()];
        Self {
            dimensionality: Dimensionality::Specified,
            dims,
            specificity,
        }
    }

    pub fn scalar() -> Self {
        Self {
            dimensionality: Dimensionality::Scalar,
            dims: vec![1],
            specificity: vec![true],
        }
    }

    pub fn unspecified() -> Self {
        Self {
            dimensionality: Dimensionality::NotSpecified,
            dims: Vec::new(),
            specificity: Vec::new(),
        }
    }

    pub fn with_specificity(dims: Vec<u32>, specificity: Vec<bool>) -> Result<Self> {
        if dims.len() != specificity.len() {
            return Err(DeserializeError::malformed_tensor(format!(
                "{} dimensions but {} specificity flags",
                dims.len(),
                specificity.len()
            )));
        }
        Ok(Self {
            dimensionality: Dimensionality::Specified,
            dims,
            specificity,
        })
    }

    pub fn dims(&self) -> &[u32] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.dimensionality
    }

    pub fn is_fully_specified(&self) -> bool {
        self.dimensionality != Dimensionality::NotSpecified && self.specificity.iter().all(|s| *s)
    }

    /// Element count, `None` when the product of the dimensions does not fit a `usize`.
    pub fn num_elements(&self) -> Option<usize> {
        match self.dimensionality {
            Dimensionality::NotSpecified => Some(0),
            Dimensionality::Scalar => Some(1),
            Dimensionality::Specified => checked_product(self.dims.iter().map(|d| *d as usize)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Quantization {
    None,
    PerTensor { scale: f32, offset: i32 },
    PerAxis { scales: Vec<f32>, dim: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TensorInfo {
    shape: TensorShape,
    data_type: DataType,
    quantization: Quantization,
    is_constant: bool,
}

impl TensorInfo {
    pub fn new(shape: TensorShape, data_type: DataType) -> Self {
        Self {
            shape,
            data_type,
            quantization: Quantization::None,
            is_constant: false,
        }
    }

    pub fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = quantization;
        self
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn quantization(&self) -> &Quantization {
        &self.quantization
    }

    pub fn is_constant(&self) -> bool {
        self.is_constant
    }

    pub fn num_elements(&self) -> Option<usize> {
        self.shape.num_elements()
    }

    pub fn num_bytes(&self) -> Option<usize> {
        self.num_elements()?.checked_mul(self.data_type.size_in_bytes())
    }

    /// Same element type and quantization, different shape.
    pub fn reshaped(&self, shape: TensorShape) -> Self {
        Self {
            shape,
            ..self.clone()
        }
    }
}

/// Converts a serialized tensor record into a [`TensorInfo`].
pub fn to_tensor_info(record: Option<&TensorInfoRecord>) -> Result<TensorInfo> {
    let record = record.ok_or_else(|| DeserializeError::malformed_tensor("tensor info is missing"))?;
    let data_type = DataType::from_wire(record.data_type).ok_or_else(|| {
        DeserializeError::malformed_tensor(format!("unsupported data type code {}", record.data_type))
    })?;
    let dimensionality = Dimensionality::from_wire(record.dimensionality).ok_or_else(|| {
        DeserializeError::malformed_tensor(format!(
            "unknown dimensionality code {}",
            record.dimensionality
        ))
    })?;
    let shape = match dimensionality {
        Dimensionality::NotSpecified => TensorShape::unspecified(),
        Dimensionality::Scalar => TensorShape::scalar(),
        Dimensionality::Specified if record.dimension_specificity.is_empty() => {
            TensorShape::new(record.dimensions.clone())
        }
        Dimensionality::Specified => TensorShape::with_specificity(
            record.dimensions.clone(),
            record.dimension_specificity.clone(),
        )?,
    };
    let quantization = if record.quantization_scales.len() > 1 {
        if record.quantization_dim as usize >= shape.rank() {
            return Err(DeserializeError::malformed_tensor(format!(
                "quantization dimension {} out of range for rank {}",
                record.quantization_dim,
                shape.rank()
            )));
        }
        Quantization::PerAxis {
            scales: record.quantization_scales.clone(),
            dim: record.quantization_dim,
        }
    } else if data_type.is_quantized() {
        Quantization::PerTensor {
            scale: record
                .quantization_scales
                .first()
                .copied()
                .unwrap_or(record.quantization_scale),
            offset: record.quantization_offset,
        }
    } else {
        Quantization::None
    };
    Ok(TensorInfo {
        shape,
        data_type,
        quantization,
        is_constant: record.is_constant,
    })
}

/// Constant tensor data borrowed straight from the serialized buffer. Only lives while a layer is
/// being decoded; nodes keep a [`ConstTensor`] instead.
#[derive(Clone, Debug)]
pub struct ConstView<'a> {
    info: TensorInfo,
    data: &'a [u8],
}

impl<'a> ConstView<'a> {
    pub fn info(&self) -> &TensorInfo {
        &self.info
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }
}

/// Decodes a serialized constant. `name` identifies the tensor in the error raised when the record
/// is absent.
pub fn to_const_view<'a>(
    record: Option<&ConstTensorRecord<'a>>,
    name: &'static str,
) -> Result<ConstView<'a>> {
    let record = record.ok_or(DeserializeError::NullConstant {
        tensor: name,
        location: None,
    })?;
    let mut info = to_tensor_info(record.info.as_ref())?;
    info.is_constant = true;
    let encoding = ConstTensorData::from_wire(record.data_type).ok_or_else(|| {
        DeserializeError::UnsupportedEncoding {
            reason: format!("unknown data block tag {}", record.data_type),
            location: None,
        }
    })?;
    let width = encoding.element_width();
    if record.data.len() % width != 0 {
        return Err(DeserializeError::UnsupportedEncoding {
            reason: format!(
                "{} bytes is not a whole number of {encoding:?} elements",
                record.data.len()
            ),
            location: None,
        });
    }
    if width != info.data_type.size_in_bytes() {
        return Err(DeserializeError::UnsupportedEncoding {
            reason: format!(
                "{encoding:?} cannot hold {:?} elements",
                info.data_type
            ),
            location: None,
        });
    }
    let expected = info.num_elements().ok_or_else(|| {
        DeserializeError::malformed_tensor(format!(
            "element count of {:?} overflows",
            info.shape.dims()
        ))
    })?;
    let elements = record.data.len() / width;
    if elements != expected {
        return Err(DeserializeError::SizeMismatch {
            expected,
            actual: elements,
            location: None,
        });
    }
    Ok(ConstView {
        info,
        data: record.data,
    })
}

/// Constant tensor owned by an operation node.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConstTensor {
    info: TensorInfo,
    #[serde(skip)]
    data: Vec<u8>,
}

impl From<ConstView<'_>> for ConstTensor {
    fn from(view: ConstView<'_>) -> Self {
        Self {
            info: view.info,
            data: view.data.to_vec(),
        }
    }
}

impl ConstTensor {
    pub fn info(&self) -> &TensorInfo {
        &self.info
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reorders the elements so that source dimension `i` becomes destination dimension
    /// `mappings[i]`.
    pub fn permuted(&self, mappings: &[u32]) -> Result<Self> {
        let src_dims = self.info.shape.dims();
        check_permutation(mappings, src_dims.len())?;
        let mut dst_dims = vec![0u32; src_dims.len()];
        for (src, dst) in mappings.iter().enumerate() {
            dst_dims[*dst as usize] = src_dims[src];
        }
        let dst_strides = strides(&dst_dims);
        let width = self.info.data_type.size_in_bytes();
        let mut data = vec![0u8; self.data.len()];
        let mut src_index = vec![0usize; src_dims.len()];
        for chunk in self.data.chunks_exact(width) {
            let offset = src_index
                .iter()
                .zip(mappings)
                .map(|(i, dst)| i * dst_strides[*dst as usize])
                .sum::<usize>();
            data[offset * width..(offset + 1) * width].copy_from_slice(chunk);
            // advance the row-major source index
            for axis in (0..src_index.len()).rev() {
                src_index[axis] += 1;
                if src_index[axis] < src_dims[axis] as usize {
                    break;
                }
                src_index[axis] = 0;
            }
        }
        Ok(Self {
            info: self.info.reshaped(TensorShape::new(dst_dims)),
            data,
        })
    }

    /// Reinterprets the data with a new shape of the same element count.
    pub fn reshaped(mut self, dims: Vec<u32>) -> Result<Self> {
        let shape = TensorShape::new(dims);
        if shape.num_elements().is_none() || shape.num_elements() != self.info.num_elements() {
            return Err(DeserializeError::shape_mismatch(format!(
                "cannot reshape {:?} into {:?}",
                self.info.shape.dims(),
                shape.dims()
            )));
        }
        self.info = self.info.reshaped(shape);
        Ok(self)
    }
}

fn strides(dims: &[u32]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for axis in (0..dims.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * dims[axis + 1] as usize;
    }
    strides
}

/// Checks that `mappings` is a permutation of `0..rank`.
pub(crate) fn check_permutation(mappings: &[u32], rank: usize) -> Result<()> {
    let valid = mappings.len() == rank
        && mappings.iter().all(|m| (*m as usize) < rank)
        && mappings.iter().all_unique();
    if valid {
        Ok(())
    } else {
        Err(DeserializeError::invalid_parameter(format!(
            "{mappings:?} is not a permutation of {rank} dimensions"
        )))
    }
}

/// Computes the output descriptor of a reshape to `target`, where a single `-1` entry is
/// inferred from the element count of `input`.
pub fn output_shape_of_reshape(input: &TensorInfo, target: &[i32]) -> Result<TensorInfo> {
    let wildcards = target.iter().filter(|d| **d == -1).count();
    if wildcards > 1 {
        return Err(DeserializeError::MultipleWildcards {
            shape: target.to_vec(),
            location: None,
        });
    }
    if let Some(bad) = target.iter().find(|d| **d < -1) {
        return Err(DeserializeError::shape_mismatch(format!(
            "negative dimension {bad} in target shape {target:?}"
        )));
    }
    let overflow = || {
        DeserializeError::shape_mismatch(format!("element count of {target:?} overflows"))
    };
    let known = checked_product(target.iter().filter(|d| **d != -1).map(|d| *d as usize))
        .ok_or_else(overflow)?;
    let total = input.num_elements().ok_or_else(|| {
        DeserializeError::shape_mismatch(format!(
            "element count of reshape input {:?} overflows",
            input.shape().dims()
        ))
    })?;
    let dims = if wildcards == 1 {
        if known == 0 || total % known != 0 {
            return Err(DeserializeError::shape_mismatch(format!(
                "cannot infer a dimension of {target:?} from {total} elements"
            )));
        }
        let inferred = u32::try_from(total / known).map_err(|_| {
            DeserializeError::shape_mismatch(format!("inferred dimension of {target:?} overflows"))
        })?;
        target
            .iter()
            .map(|d| if *d == -1 { inferred } else { *d as u32 })
            .collect_vec()
    } else {
        if known != total {
            return Err(DeserializeError::shape_mismatch(format!(
                "target shape {target:?} holds {known} elements but the input holds {total}"
            )));
        }
        target.iter().map(|d| *d as u32).collect_vec()
    };
    Ok(input.reshaped(TensorShape::new(dims)))
}

/// Product of `values`, `None` on overflow.
fn checked_product(mut values: impl Iterator<Item = usize>) -> Option<usize> {
    values.try_fold(1usize, |acc, value| acc.checked_mul(value))
}
