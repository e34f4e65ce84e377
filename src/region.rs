//! Region façade: composes the spatial and temporal poolers behind one
//! `write`/`backwards`/`stats` surface (spec.md §4.3).

use crate::args::Args;
use crate::bitfield::BitField;
use crate::compute::{ComputeContext, Device};
use crate::error::Result;
use crate::spatial_pooler::{SpatialPooler, SpatialStats};
use crate::temporal_pooler::{TemporalPooler, TemporalStats};
use crate::topology::Topology;

/// Merged spatial + temporal statistics (spec.md §4.3, enriched per
/// SPEC_FULL.md §B.4 with capacity-utilisation counters).
#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    /// Mean column boost.
    pub average_boost: f64,
    /// Mean column active-duty-cycle.
    pub average_duty_cycle: f64,
    /// Cells currently active.
    pub active: usize,
    /// Cells currently predictive.
    pub predictive: usize,
    /// Cells currently learning.
    pub learning: usize,
    /// Mean segment active-duty-cycle.
    pub average_segment_duty_cycle: f64,
    /// Distal segments currently allocated.
    pub total_segments: usize,
    /// Distal segment capacity.
    pub max_segments: usize,
    /// Distal synapses currently wired.
    pub total_synapses: usize,
    /// Distal synapse capacity.
    pub max_synapses: usize,
}

/// Composes a [`SpatialPooler`] and a [`TemporalPooler`] over one
/// [`ComputeContext`], exposing the single public surface a caller drives.
pub struct Region {
    ctx: ComputeContext,
    spatial: SpatialPooler,
    temporal: TemporalPooler,
}

impl Region {
    /// Construct a region on the default (CPU) device.
    pub fn new(topology: Topology, args: Args) -> Result<Self> {
        let ctx = ComputeContext::new(&topology, &args)?;
        Self::with_context(ctx, topology, args)
    }

    /// Construct a region bound to an explicit device.
    pub fn with_device(device: Device, topology: Topology, args: Args) -> Result<Self> {
        let ctx = ComputeContext::with_device(device, &topology, &args)?;
        Self::with_context(ctx, topology, args)
    }

    fn with_context(ctx: ComputeContext, topology: Topology, args: Args) -> Result<Self> {
        let spatial = SpatialPooler::new(&ctx, topology, args)?;
        let temporal = TemporalPooler::new(&ctx, topology, args)?;
        Ok(Region { ctx, spatial, temporal })
    }

    /// Pipe `input` through the spatial pooler and, if `temporal` is `true`,
    /// through the temporal pooler; returns the temporal pooler's per-column
    /// predictions, or the spatial pooler's raw activations when `temporal`
    /// is `false` (spec.md §8 scenario 5).
    ///
    /// `learning` gates permanence/synapse updates in both poolers
    /// (SPEC_FULL.md §B.1, restoring the original's learning on/off switch).
    pub fn write(&mut self, input: &BitField, learning: bool, temporal: bool) -> Result<BitField> {
        let activations = self.spatial.write(&mut self.ctx, input, learning)?;
        if temporal {
            self.temporal.write(&mut self.ctx, &activations, learning)
        } else {
            Ok(activations)
        }
    }

    /// Delegate to the spatial pooler's `backwards`.
    pub fn backwards(&self, activations: &BitField) -> Result<Vec<u32>> {
        self.spatial.backwards(activations)
    }

    /// Merge spatial and temporal statistics into one struct.
    pub fn stats(&self) -> Stats {
        let SpatialStats {
            average_boost,
            average_duty_cycle,
        } = self.spatial.stats();
        let TemporalStats {
            active,
            predictive,
            learning,
            average_segment_duty_cycle,
            total_segments,
            max_segments,
            total_synapses,
            max_synapses,
        } = self.temporal.stats();

        Stats {
            average_boost,
            average_duty_cycle,
            active,
            predictive,
            learning,
            average_segment_duty_cycle,
            total_segments,
            max_segments,
            total_synapses,
            max_synapses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_invalid_shape_propagates_from_spatial_pooler() {
        let topology = Topology::line(80, 40, -1, -1);
        let mut region = Region::new(topology, Args::default()).unwrap();
        let bad = BitField::new(4);
        assert!(region.write(&bad, true, true).is_err());
    }

    #[test]
    fn test_temporal_false_matches_spatial_activations() {
        let topology = Topology::line(40, 20, -1, -1);
        let args = Args {
            column_proximal_synapse_count: 10,
            column_proximal_synapse_min_overlap: 2,
            ..Args::default()
        };
        let mut region = Region::new(topology, args).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let mut bits = BitField::new(40);
        bits.random_set_pct(&mut rng, 0.3);

        let spatial_only = region.write(&bits, true, false).unwrap();
        assert_eq!(spatial_only.num_bits(), topology.columns());
    }

    #[test]
    fn test_stats_merges_both_poolers() {
        let topology = Topology::line(20, 10, -1, -1);
        let region = Region::new(topology, Args::default()).unwrap();
        let stats = region.stats();
        assert_eq!(stats.active, 0);
        assert!(stats.average_boost >= 1.0);
        assert!(stats.max_segments > 0);
    }

    #[test]
    fn test_single_input_single_column_does_not_crash() {
        let topology = Topology::line(1, 1, -1, -1);
        let args = Args {
            column_proximal_synapse_count: 1,
            column_proximal_synapse_min_overlap: 1,
            ..Args::default()
        };
        let mut region = Region::new(topology, args).unwrap();
        let mut on = BitField::new(1);
        on.set_bit(0);
        let off = BitField::new(1);

        for _ in 0..10 {
            region.write(&on, true, true).unwrap();
            region.write(&off, true, true).unwrap();
        }
    }
}
