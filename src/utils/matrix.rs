//! Matrix and tensor utilities shared by the layer implementations
//!
//! A `Matrix` is a row-major `Vec<Vec<f64>>`; a `Tensor` is an ordered list of
//! equally sized matrices, one per feature-map channel (channel order is
//! semantically significant). All operations here are pure and perform no
//! implicit broadcasting: shape mismatches are caller contract violations and
//! panic with the offending dimensions.

/// A single 2-D feature map, row-major.
pub type Matrix = Vec<Vec<f64>>;

/// An ordered list of channels of identical shape.
pub type Tensor = Vec<Matrix>;

/// Elementwise sum of two equal-shaped matrices.
///
/// # Panics
///
/// Panics if the shapes differ, naming both shapes.
pub fn add(a: &Matrix, b: &Matrix) -> Matrix {
    assert_eq!(
        (a.len(), a.first().map_or(0, Vec::len)),
        (b.len(), b.first().map_or(0, Vec::len)),
        "matrix add shape mismatch: {}x{} vs {}x{}",
        a.len(),
        a.first().map_or(0, Vec::len),
        b.len(),
        b.first().map_or(0, Vec::len)
    );

    a.iter()
        .zip(b)
        .map(|(ra, rb)| ra.iter().zip(rb).map(|(x, y)| x + y).collect())
        .collect()
}

/// Elementwise scale of a matrix.
pub fn scalar_multiply(a: &Matrix, scalar: f64) -> Matrix {
    a.iter()
        .map(|row| row.iter().map(|x| x * scalar).collect())
        .collect()
}

/// Allocate a zeroed rows x cols matrix.
pub fn zeros(rows: usize, cols: usize) -> Matrix {
    vec![vec![0.0; cols]; rows]
}

/// Mirror a matrix left-to-right.
pub fn flip_horizontally(input: &Matrix) -> Matrix {
    input
        .iter()
        .map(|row| row.iter().rev().copied().collect())
        .collect()
}

/// Mirror a matrix top-to-bottom.
pub fn flip_vertically(input: &Matrix) -> Matrix {
    input.iter().rev().cloned().collect()
}

/// Unflatten a vector into `channels` matrices of `rows` x `cols`.
///
/// The vector is read channel-major, then row-major, then by column; together
/// with [`tensor_to_vector`] this forms a lossless bijection for matching
/// sizes.
///
/// # Panics
///
/// Panics if the vector length does not equal `channels * rows * cols`.
pub fn vector_to_tensor(vector: &[f64], channels: usize, rows: usize, cols: usize) -> Tensor {
    assert_eq!(
        vector.len(),
        channels * rows * cols,
        "cannot reshape vector of length {} into {} channels of {}x{}",
        vector.len(),
        channels,
        rows,
        cols
    );

    let mut output = Vec::with_capacity(channels);
    let mut index = 0;

    for _ in 0..channels {
        let mut channel = Vec::with_capacity(rows);
        for _ in 0..rows {
            channel.push(vector[index..index + cols].to_vec());
            index += cols;
        }
        output.push(channel);
    }

    output
}

/// Flatten an ordered channel list into a single vector.
///
/// Inverse of [`vector_to_tensor`]: channel-major, then row-major, then by
/// column.
pub fn tensor_to_vector(tensor: &Tensor) -> Vec<f64> {
    let mut output = Vec::new();
    for channel in tensor {
        for row in channel {
            output.extend_from_slice(row);
        }
    }
    output
}
