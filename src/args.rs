//! Learning hyper-parameters shared by the spatial and temporal poolers.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{CoreError, Result};

/// Hyper-parameters governing proximal and distal synapse learning.
///
/// Immutable once a `Region` is constructed from it. Values outside their
/// documented domain are rejected by [`Args::validate`], which every pooler
/// constructor calls.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Args {
    /// Permanence at or above which a synapse counts as "connected".
    pub connected_permanence: f64,
    /// Permanence delta applied on each reinforcement/punishment.
    pub permanence_step: f64,

    // Spatial pooler
    /// Proximal synapses sampled per column.
    pub column_proximal_synapse_count: usize,
    /// Minimum connected overlap before boosting is applied; below this the
    /// column's overlap is forced to zero.
    pub column_proximal_synapse_min_overlap: usize,
    /// Amount boost grows per write when a column is under-active.
    pub boost_step: f64,
    /// EMA persistence for the duty-cycle trackers (closer to 1 = slower).
    pub duty_cycle_persistence: f64,
    /// Target fraction of a neighbourhood that may be active at once.
    ///
    /// Resolves the first spec.md §9 Open Question: the original's hard-coded
    /// 2-4% inhibition constant is promoted to a first-class field.
    pub target_sparsity: f64,
    /// Number of `write` calls between spatial-pooler refine passes.
    pub refine_interval: u32,

    // Temporal pooler
    /// Cells per column.
    pub column_cell_count: usize,
    /// Distal segments per cell.
    pub cell_segment_count: usize,
    /// Distal synapses per segment.
    pub segment_synapse_count: usize,
    /// Connected-synapse count a segment needs to drive its cell predictive.
    pub segment_activation_threshold: usize,
    /// Lower (unconnected-inclusive) synapse count used for "weak match"
    /// segment selection (learning-cell choice, second-best prediction).
    pub segment_min_threshold: usize,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            connected_permanence: 0.2,
            permanence_step: 0.05,
            column_proximal_synapse_count: 10,
            column_proximal_synapse_min_overlap: 7,
            boost_step: 0.01,
            duty_cycle_persistence: 0.99,
            target_sparsity: 0.04,
            refine_interval: 100,
            column_cell_count: 4,
            cell_segment_count: 10,
            segment_synapse_count: 10,
            segment_activation_threshold: 5,
            segment_min_threshold: 3,
        }
    }
}

impl Args {
    /// Check every field is within its documented domain.
    ///
    /// Called by pooler construction; initialisation errors are fatal (the
    /// region cannot be constructed), per spec.md §7.
    pub fn validate(&self) -> Result<()> {
        let checks: &[(bool, &str)] = &[
            (
                (0.0..=1.0).contains(&self.connected_permanence),
                "connected_permanence must be in [0,1]",
            ),
            (self.permanence_step > 0.0, "permanence_step must be > 0"),
            (
                self.column_proximal_synapse_count > 0,
                "column_proximal_synapse_count must be > 0",
            ),
            (
                self.column_proximal_synapse_min_overlap <= self.column_proximal_synapse_count,
                "column_proximal_synapse_min_overlap must be <= column_proximal_synapse_count",
            ),
            (self.boost_step >= 0.0, "boost_step must be >= 0"),
            (
                (0.0..1.0).contains(&self.duty_cycle_persistence),
                "duty_cycle_persistence must be in [0,1)",
            ),
            (
                self.target_sparsity > 0.0 && self.target_sparsity <= 1.0,
                "target_sparsity must be in (0,1]",
            ),
            (self.column_cell_count > 0, "column_cell_count must be > 0"),
            (self.cell_segment_count > 0, "cell_segment_count must be > 0"),
            (
                self.segment_synapse_count > 0,
                "segment_synapse_count must be > 0",
            ),
            (
                self.segment_activation_threshold <= self.segment_synapse_count,
                "segment_activation_threshold must be <= segment_synapse_count",
            ),
            (
                self.segment_min_threshold <= self.segment_activation_threshold,
                "segment_min_threshold must be <= segment_activation_threshold",
            ),
        ];

        for (ok, message) in checks {
            if !ok {
                return Err(CoreError::InvalidParameter(message.to_string()));
            }
        }
        Ok(())
    }

    /// Render the `constant TYPE NAME = VALUE;` declaration block a future
    /// device backend would prepend to kernel source, per spec.md §6.
    pub fn to_kernel_constants(&self) -> String {
        format!(
            "constant float CONNECTED_PERMANENCE = {};constant float PERMANENCE_STEP = {};\
             constant int COLUMN_PROXIMAL_SYNAPSE_COUNT = {};\
             constant int COLUMN_PROXIMAL_SYNAPSE_MIN_OVERLAP = {};\
             constant float BOOST_STEP = {};constant float DUTY_CYCLE_PERSISTENCE = {};\
             constant float TARGET_SPARSITY = {};constant uint REFINE_INTERVAL = {};\
             constant int COLUMN_CELL_COUNT = {};constant int CELL_SEGMENT_COUNT = {};\
             constant int SEGMENT_SYNAPSE_COUNT = {};\
             constant int SEGMENT_ACTIVATION_THRESHOLD = {};\
             constant int SEGMENT_MIN_THRESHOLD = {};",
            self.connected_permanence,
            self.permanence_step,
            self.column_proximal_synapse_count,
            self.column_proximal_synapse_min_overlap,
            self.boost_step,
            self.duty_cycle_persistence,
            self.target_sparsity,
            self.refine_interval,
            self.column_cell_count,
            self.cell_segment_count,
            self.segment_synapse_count,
            self.segment_activation_threshold,
            self.segment_min_threshold,
        )
    }

    /// Load args from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let args: Args = serde_json::from_reader(reader)?;
        args.validate()?;
        Ok(args)
    }

    /// Save args to a JSON file.
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
    fn test_default_matches_original_hyperparameters() {
        let args = Args::default();
        assert_eq!(args.connected_permanence, 0.2);
        assert_eq!(args.permanence_step, 0.05);
        assert_eq!(args.column_proximal_synapse_count, 10);
        assert_eq!(args.column_proximal_synapse_min_overlap, 7);
        assert_eq!(args.column_cell_count, 4);
        assert_eq!(args.cell_segment_count, 10);
        assert_eq!(args.segment_synapse_count, 10);
        assert_eq!(args.segment_activation_threshold, 5);
        assert_eq!(args.segment_min_threshold, 3);
        assert_eq!(args.target_sparsity, 0.04);
        assert_eq!(args.refine_interval, 100);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_permanence() {
        let mut args = Args::default();
        args.connected_permanence = 1.5;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut args = Args::default();
        args.segment_activation_threshold = 20;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_kernel_constants_rendering() {
        let args = Args::default();
        let s = args.to_kernel_constants();
        assert!(s.contains("constant float CONNECTED_PERMANENCE = 0.2;"));
        assert!(s.contains("constant int CELL_SEGMENT_COUNT = 10;"));
    }

    #[test]
    fn test_roundtrip_json() {
        let args = Args::default();
        let json = serde_json::to_string(&args).unwrap();
        let back: Args = serde_json::from_str(&json).unwrap();
        assert_eq!(args, back);
    }
}
