//! Reconciles the shapes of arrays gathered on the buffer path.
//!
//! Every rank's shape goes into a [`ShapeTable`], indexed by rank. The
//! arrays may differ in at most one axis (the varying axis); the table then
//! gives each rank's element count and its offset into the root's
//! contiguous receive buffer, and splits that buffer back into arrays.

use crate::error::{Error, Result};
use crate::message;
use log::warn;
use ndarray::{ArrayD, IxDyn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeTable {
    shapes: Vec<Vec<usize>>,
    varying_axis: usize,
    counts: Vec<usize>,
    displs: Vec<usize>,
}

impl ShapeTable {
    /// Validates the per-rank shapes, failing with [`Error::ShapeMismatch`]
    /// when they differ in their number of dimensions or in more than one
    /// axis.
    pub fn new(shapes: Vec<Vec<usize>>) -> Result<Self> {
        let varying_axis = match varying_axis(&shapes) {
            Some(axis) => axis,
            None => {
                warn!("rejecting gathered shapes {:?}", shapes);
                return Err(Error::ShapeMismatch { shapes });
            }
        };
        let counts: Vec<usize> = shapes.iter().map(|s| s.iter().product()).collect();
        let displs = counts
            .iter()
            .scan(0, |offset, &count| {
                let displ = *offset;
                *offset += count;
                Some(displ)
            })
            .collect();
        Ok(Self {
            shapes,
            varying_axis,
            counts,
            displs,
        })
    }

    pub fn shapes(&self) -> &[Vec<usize>] {
        &self.shapes
    }

    /// The one axis allowed to differ between ranks; 0 when every shape is
    /// the same.
    pub fn varying_axis(&self) -> usize {
        self.varying_axis
    }

    /// Number of elements contributed by each rank.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Offset of each rank's elements in the combined buffer.
    pub fn displs(&self) -> &[usize] {
        &self.displs
    }

    /// Total number of elements over all ranks.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Cuts the combined buffer into one array per rank, each reshaped to
    /// the shape that rank contributed.
    pub fn split<T>(&self, buffer: Vec<T>) -> Result<Vec<ArrayD<T>>> {
        if buffer.len() != self.total() {
            return Err(message::Error::BufferLength {
                expected: self.total(),
                actual: buffer.len(),
            }
            .into());
        }
        let mut elements = buffer.into_iter();
        self.shapes
            .iter()
            .zip(&self.counts)
            .map(|(shape, &count)| {
                let chunk: Vec<T> = elements.by_ref().take(count).collect();
                ArrayD::from_shape_vec(IxDyn(shape), chunk)
                    .map_err(|e| Error::InvalidArgument(format!("cannot reshape to {shape:?}: {e}")))
            })
            .collect()
    }
}

fn varying_axis(shapes: &[Vec<usize>]) -> Option<usize> {
    let first = match shapes.first() {
        Some(first) => first,
        None => return Some(0),
    };
    if shapes.iter().any(|s| s.len() != first.len()) {
        return None;
    }
    let mut differing = (0..first.len()).filter(|&axis| shapes.iter().any(|s| s[axis] != first[axis]));
    match (differing.next(), differing.next()) {
        (None, _) => Some(0),
        (Some(axis), None) => Some(axis),
        (Some(_), Some(_)) => None,
    }
}
