use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Dense row-major numeric payload with an explicit shape.
///
/// Signals use shape `(channels, samples)`, waveforms use
/// `(spikes, channels, samples)` and stored arrays use whatever shape they
/// were written with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NdArray {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl NdArray {
    /// Create from a shape and row-major values.
    pub fn new(shape: Vec<usize>, values: Vec<f64>) -> Result<Self, TypeError> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(TypeError::ShapeMismatch {
                shape,
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { shape, values })
    }

    /// One-dimensional array.
    pub fn vector(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }

    /// Zero-length array of the given rank, used as a lazy placeholder.
    pub fn placeholder(rank: usize) -> Self {
        Self {
            shape: vec![0; rank.max(1)],
            values: Vec::new(),
        }
    }

    /// Stack equally long rows into a `(rows, columns)` array.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, TypeError> {
        let columns = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * columns);
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns {
                return Err(TypeError::RaggedChannels {
                    channel: index,
                    expected: columns,
                    actual: row.len(),
                });
            }
            values.extend_from_slice(row);
        }
        Ok(Self {
            shape: vec![rows.len(), columns],
            values,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Length of the leading axis.
    pub fn outer_len(&self) -> usize {
        self.shape.first().copied().unwrap_or(0)
    }

    /// The `index`-th slice along the leading axis, flattened.
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.outer_len() {
            return None;
        }
        let stride: usize = self.shape[1..].iter().product();
        Some(&self.values[index * stride..(index + 1) * stride])
    }

    /// Iterate over the slices along the leading axis.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.outer_len()).filter_map(move |i| self.row(i))
    }
}

impl Default for NdArray {
    fn default() -> Self {
        Self::placeholder(1)
    }
}
