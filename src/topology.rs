//! Region topology: input/column dimensions and inhibition geometry.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::Result;

/// Input/region dimensions and inhibition/receptive-field geometry.
///
/// Immutable once a `Region` is constructed from it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// Input pattern width.
    pub input_width: usize,
    /// Input pattern height (1 for a 1-D input).
    pub input_height: usize,
    /// Column grid width.
    pub region_width: usize,
    /// Column grid height (1 for a 1-D region).
    pub region_height: usize,
    /// Inhibition neighbourhood radius, or `-1` for global inhibition.
    pub inhibition_radius: i32,
    /// Receptive-field radius in input space, or `-1` for unlimited.
    pub receptive_field_radius: i32,
}

impl Topology {
    /// Total number of input bits.
    #[inline]
    pub fn input_size(&self) -> usize {
        self.input_width * self.input_height
    }

    /// Total number of columns.
    #[inline]
    pub fn columns(&self) -> usize {
        self.region_width * self.region_height
    }

    /// Whether inhibition spans the whole region rather than a local radius.
    #[inline]
    pub fn is_global_inhibition(&self) -> bool {
        self.inhibition_radius < 0
    }

    /// Whether a column's receptive field is unrestricted.
    #[inline]
    pub fn is_unlimited_receptive_field(&self) -> bool {
        self.receptive_field_radius < 0
    }

    /// A 2-D region with global inhibition and unlimited receptive fields.
    pub fn global_inhibition_2d(
        input_width: usize,
        input_height: usize,
        region_width: usize,
        region_height: usize,
    ) -> Self {
        Topology {
            input_width,
            input_height,
            region_width,
            region_height,
            inhibition_radius: -1,
            receptive_field_radius: -1,
        }
    }

    /// A 2-D region with a bounded inhibition radius and receptive field.
    pub fn local_inhibition_2d(
        input_width: usize,
        input_height: usize,
        region_width: usize,
        region_height: usize,
        inhibition_radius: i32,
        receptive_field_radius: i32,
    ) -> Self {
        Topology {
            input_width,
            input_height,
            region_width,
            region_height,
            inhibition_radius,
            receptive_field_radius,
        }
    }

    /// A 1-D region (height fixed at 1).
    pub fn line(
        input_length: usize,
        region_length: usize,
        inhibition_radius: i32,
        receptive_field_radius: i32,
    ) -> Self {
        Topology {
            input_width: input_length,
            input_height: 1,
            region_width: region_length,
            region_height: 1,
            inhibition_radius,
            receptive_field_radius,
        }
    }

    /// Render the `constant TYPE NAME = VALUE;` declaration block a future
    /// device backend would prepend to kernel source.
    pub fn to_kernel_constants(&self) -> String {
        format!(
            "constant int INPUT_WIDTH = {};constant int INPUT_HEIGHT = {};\
             constant int REGION_WIDTH = {};constant int REGION_HEIGHT = {};\
             constant int INHIBITION_RADIUS = {};constant int RECEPTIVE_FIELD_RADIUS = {};",
            self.input_width,
            self.input_height,
            self.region_width,
            self.region_height,
            self.inhibition_radius,
            self.receptive_field_radius,
        )
    }

    /// Load a topology from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Save a topology to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_inhibition_2d() {
        let topo = Topology::global_inhibition_2d(10, 10, 20, 20);
        assert_eq!(topo.input_size(), 100);
        assert_eq!(topo.columns(), 400);
        assert!(topo.is_global_inhibition());
        assert!(topo.is_unlimited_receptive_field());
    }

    #[test]
    fn test_line() {
        let topo = Topology::line(80, 80, 5, 5);
        assert_eq!(topo.input_height, 1);
        assert_eq!(topo.region_height, 1);
        assert!(!topo.is_global_inhibition());
        assert_eq!(topo.inhibition_radius, 5);
    }

    #[test]
    fn test_local_inhibition_2d() {
        let topo = Topology::local_inhibition_2d(32, 32, 32, 32, 5, 5);
        assert_eq!(topo.columns(), 1024);
        assert!(!topo.is_global_inhibition());
    }

    #[test]
    fn test_kernel_constants_rendering() {
        let topo = Topology::line(80, 80, 5, 5);
        let s = topo.to_kernel_constants();
        assert!(s.contains("constant int INPUT_WIDTH = 80;"));
        assert!(s.contains("constant int INHIBITION_RADIUS = 5;"));
    }

    #[test]
    fn test_roundtrip_json() {
        let topo = Topology::line(80, 80, 5, 5);
        let json = serde_json::to_string(&topo).unwrap();
        let back: Topology = serde_json::from_str(&json).unwrap();
        assert_eq!(topo, back);
    }
}
