//! Labeled samples and the CSV data source
//!
//! Samples are fixed-size pixel-intensity matrices paired with an integer
//! class label, read from MNIST-style CSV files (label first, then row-major
//! pixels).

use crate::utils::Matrix;
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};

/// An immutable image/label pair consumed by the network.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    /// Pixel intensities, row-major.
    pub data: Matrix,
    /// Class label.
    pub label: usize,
}

/// Read labeled samples from a CSV file.
///
/// Each line holds `1 + rows * cols` comma-separated values: the label
/// followed by the pixels in row-major order.
///
/// # Returns
///
/// `Ok(Vec<LabeledSample>)` on success, or an error if the file cannot be
/// read, a value does not parse, or a row has the wrong number of pixels.
///
/// # Examples
///
/// ```no_run
/// use convnet::data::read_csv;
///
/// let test = read_csv("data/mnist_test.csv", 28, 28).unwrap();
/// assert!(!test.is_empty());
/// ```
pub fn read_csv(path: &str, rows: usize, cols: usize) -> Result<Vec<LabeledSample>, Box<dyn Error>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut samples = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let mut values = line.split(',');
        let label: usize = values
            .next()
            .ok_or_else(|| invalid_line(path, line_number, "missing label"))?
            .trim()
            .parse()
            .map_err(|_| invalid_line(path, line_number, "label is not an integer"))?;

        let pixels = values
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|_| invalid_line(path, line_number, "pixel is not a number"))?;

        if pixels.len() != rows * cols {
            return Err(invalid_line(
                path,
                line_number,
                &format!("expected {} pixels, found {}", rows * cols, pixels.len()),
            ));
        }

        let data = pixels.chunks(cols).map(<[f64]>::to_vec).collect();
        samples.push(LabeledSample { data, label });
    }

    Ok(samples)
}

fn invalid_line(path: &str, line_number: usize, reason: &str) -> Box<dyn Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("{}:{}: {}", path, line_number + 1, reason),
    ))
}
