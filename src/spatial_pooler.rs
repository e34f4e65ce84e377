//! Spatial pooler: maps dense binary input into sparse column activations.
//!
//! Implements spec.md §4.1: four kernels (overlap, inhibition, permanence
//! update, periodic refine) operating over flat, struct-of-arrays buffers
//! (spec.md §9's mandated layout), plus the on-construction `initRegion`
//! kernel.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::args::Args;
use crate::bitfield::BitField;
use crate::compute::ComputeContext;
use crate::error::{CoreError, Result};
use crate::topology::Topology;
use crate::utils::clipped_normal;

/// Small permanence a re-seeded (refine) or freshly-rescued synapse starts at.
const SEED_PERMANENCE: f64 = 0.1;
/// Fraction of `permanence_step` used for the overlap-duty-cycle "column
/// rescue" bump (spec.md §4.1 phase 3: "a small permanence bump").
const RESCUE_STEP_FRACTION: f64 = 0.1;
/// Fraction of the max neighbourhood active-duty-cycle used as the dynamic
/// `min_duty_cycle` threshold (spec.md §4.1).
const MIN_DUTY_CYCLE_FRACTION: f64 = 0.01;

/// A proximal synapse connecting a column to one input bit.
#[derive(Clone, Copy, Debug)]
pub struct ProximalSynapse {
    /// Connection strength in `[0, 1]`.
    pub permanence: f64,
    /// Index into the input bit pattern this synapse targets.
    pub target: usize,
}

/// One column's pooling state.
#[derive(Clone, Copy, Debug, Default)]
pub struct Column {
    /// Per-column multiplier raising under-used columns' overlaps.
    pub boost: f64,
    /// Post-boost overlap computed this step (0 if below the min-overlap gate).
    pub overlap: f64,
    /// Whether this column won inhibition this step.
    pub active: bool,
    /// EMA of how often this column has been active.
    pub active_duty_cycle: f64,
    /// Dynamic inhibition threshold, a fraction of the neighbourhood max.
    pub min_duty_cycle: f64,
    /// EMA of how often this column has had nonzero overlap.
    pub overlap_duty_cycle: f64,
}

/// Aggregate spatial-pooler statistics (spec.md §4.1 `stats()`).
#[derive(Clone, Copy, Debug, Default)]
pub struct SpatialStats {
    /// Mean `boost` across all columns.
    pub average_boost: f64,
    /// Mean `active_duty_cycle` across all columns.
    pub average_duty_cycle: f64,
}

/// The spatial-pooling engine: column + proximal-synapse buffers and the
/// four-phase `write` pipeline.
pub struct SpatialPooler {
    topology: Topology,
    args: Args,
    columns: Vec<Column>,
    synapses: Vec<ProximalSynapse>,
    host_rng: StdRng,
    refine_counter: u32,
}

impl SpatialPooler {
    /// Construct a pooler and run the `initRegion` kernel with an
    /// entropy-seeded host RNG.
    pub fn new(ctx: &ComputeContext, topology: Topology, args: Args) -> Result<Self> {
        Self::seeded(ctx, topology, args, StdRng::from_entropy())
    }

    /// Construct a pooler with an explicit host RNG, for deterministic tests.
    pub fn seeded(
        ctx: &ComputeContext,
        topology: Topology,
        args: Args,
        mut host_rng: StdRng,
    ) -> Result<Self> {
        args.validate()?;
        let columns = topology.columns();
        let syn_count = args.column_proximal_synapse_count;

        info!(
            "SpatialPooler: {} columns, {} proximal synapses/column, device {:?}",
            columns,
            syn_count,
            ctx.device()
        );

        let mut synapses = Vec::with_capacity(columns * syn_count);
        for c in 0..columns {
            for _ in 0..syn_count {
                synapses.push(ProximalSynapse {
                    permanence: clipped_normal(0.2, 0.2, 0.0, 1.0, &mut host_rng),
                    target: sample_target(&topology, c, &mut host_rng),
                });
            }
        }

        Ok(SpatialPooler {
            topology,
            args,
            columns: vec![Column { boost: 1.0, ..Default::default() }; columns],
            synapses,
            host_rng,
            refine_counter: 0,
        })
    }

    /// Number of columns.
    pub fn columns(&self) -> usize {
        self.topology.columns()
    }

    /// Snapshot of one column's pooling state (test/inspection hook; lets
    /// callers assert on a single column's `active_duty_cycle` rather than
    /// only the population mean exposed by [`SpatialPooler::stats`]).
    pub fn column_state(&self, idx: usize) -> Column {
        self.columns[idx]
    }

    /// Read-only view of one column's proximal synapses (test/inspection
    /// hook; exposes raw permanences so callers can distinguish a synapse
    /// that has collapsed to zero from one `refine` has reseeded, which
    /// `backwards`'s connected-synapse counts cannot).
    pub fn synapses_of_column(&self, idx: usize) -> &[ProximalSynapse] {
        let syn_count = self.args.column_proximal_synapse_count;
        let base = idx * syn_count;
        &self.synapses[base..base + syn_count]
    }

    /// Run the four-phase pipeline over `bits`, returning per-column active
    /// flags. `learning` gates phase 3 (permanence update); when `false` the
    /// pooler still computes activations but leaves synapses/duty-cycles
    /// unchanged (SPEC_FULL.md §B.1).
    pub fn write(&mut self, ctx: &mut ComputeContext, bits: &BitField, learning: bool) -> Result<BitField> {
        if bits.num_bits() != self.topology.input_size() {
            return Err(CoreError::InvalidShape {
                expected: self.topology.input_size(),
                actual: bits.num_bits(),
            });
        }
        let input = bits.get_bits();
        let syn_count = self.args.column_proximal_synapse_count;
        let n = self.columns.len();

        ctx.queue_mut().log_dispatch("overlap", n);
        phase_overlap(&mut self.columns, &self.synapses, &input, &self.args, syn_count);

        ctx.queue_mut().log_dispatch("inhibition", n);
        phase_inhibition(&mut self.columns, &self.topology, &self.args);

        if learning {
            ctx.queue_mut().log_dispatch("update_permanences", n);
            phase_permanence_update(
                &mut self.columns,
                &mut self.synapses,
                &input,
                &self.topology,
                &self.args,
                syn_count,
            );

            self.refine_counter += 1;
            if self.refine_counter >= self.args.refine_interval {
                ctx.queue_mut().log_dispatch("refine_region", n);
                let seed = (self.host_rng.gen::<u32>(), self.host_rng.gen::<u32>());
                phase_refine(&self.columns, &mut self.synapses, &self.topology, syn_count, seed);
                info!("spatial pooler: refine kernel ran, counter reset");
                self.refine_counter = 0;
            }
        }

        ctx.queue().finish();
        let mut out = BitField::new(self.columns.len());
        for (i, col) in self.columns.iter().enumerate() {
            if col.active {
                out.set_bit(i);
            }
        }
        Ok(out)
    }

    /// Sum one per connected proximal synapse belonging to an active column,
    /// onto the input index it targets. Uses the pooler's current synapse
    /// state (the host shadow is always current on the CPU backend; a real
    /// device backend would download first, per spec.md §4.1).
    pub fn backwards(&self, activations: &BitField) -> Result<Vec<u32>> {
        if activations.num_bits() != self.columns.len() {
            return Err(CoreError::InvalidShape {
                expected: self.columns.len(),
                actual: activations.num_bits(),
            });
        }
        let syn_count = self.args.column_proximal_synapse_count;
        let mut weights = vec![0u32; self.topology.input_size()];
        for c in 0..self.columns.len() {
            if activations.get_bit(c) == 0 {
                continue;
            }
            let base = c * syn_count;
            for syn in &self.synapses[base..base + syn_count] {
                if syn.permanence >= self.args.connected_permanence {
                    weights[syn.target] += 1;
                }
            }
        }
        Ok(weights)
    }

    /// Average boost and active-duty-cycle across all columns.
    pub fn stats(&self) -> SpatialStats {
        if self.columns.is_empty() {
            return SpatialStats::default();
        }
        let n = self.columns.len() as f64;
        let (boost_sum, duty_sum) = self
            .columns
            .iter()
            .fold((0.0, 0.0), |(b, d), c| (b + c.boost, d + c.active_duty_cycle));
        SpatialStats {
            average_boost: boost_sum / n,
            average_duty_cycle: duty_sum / n,
        }
    }
}

fn neighbourhood_indices(topology: &Topology, col_idx: usize) -> Vec<usize> {
    if topology.is_global_inhibition() {
        return (0..topology.columns()).collect();
    }
    let r = topology.inhibition_radius;
    let w = topology.region_width as i32;
    let h = topology.region_height as i32;
    let cx = (col_idx as i32) % w;
    let cy = (col_idx as i32) / w;
    let mut out = Vec::new();
    for dy in -r..=r {
        for dx in -r..=r {
            let x = cx + dx;
            let y = cy + dy;
            if x >= 0 && x < w && y >= 0 && y < h {
                out.push((y * w + x) as usize);
            }
        }
    }
    out
}

fn projected_input_coord(topology: &Topology, col_idx: usize) -> (i32, i32) {
    let cx = (col_idx % topology.region_width) as f64;
    let cy = (col_idx / topology.region_width) as f64;
    let ix = (cx / topology.region_width as f64 * topology.input_width as f64) as i32;
    let iy = (cy / topology.region_height as f64 * topology.input_height as f64) as i32;
    (ix, iy)
}

fn sample_target<R: Rng>(topology: &Topology, col_idx: usize, rng: &mut R) -> usize {
    if topology.is_unlimited_receptive_field() {
        return rng.gen_range(0..topology.input_size());
    }
    let r = topology.receptive_field_radius;
    let (cx, cy) = projected_input_coord(topology, col_idx);
    let x_lo = (cx - r).max(0);
    let x_hi = (cx + r).min(topology.input_width as i32 - 1);
    let y_lo = (cy - r).max(0);
    let y_hi = (cy + r).min(topology.input_height as i32 - 1);
    let x = rng.gen_range(x_lo..=x_hi);
    let y = rng.gen_range(y_lo..=y_hi);
    (y as usize) * topology.input_width + x as usize
}

fn phase_overlap(
    columns: &mut [Column],
    synapses: &[ProximalSynapse],
    input: &[u8],
    args: &Args,
    syn_count: usize,
) {
    let update = |i: usize, col: &mut Column| {
        let base = i * syn_count;
        let mut connected_active = 0usize;
        for syn in &synapses[base..base + syn_count] {
            if syn.permanence >= args.connected_permanence && input[syn.target] != 0 {
                connected_active += 1;
            }
        }
        col.overlap = if connected_active >= args.column_proximal_synapse_min_overlap {
            connected_active as f64 * col.boost
        } else {
            0.0
        };
    };

    #[cfg(feature = "parallel")]
    columns.par_iter_mut().enumerate().for_each(|(i, c)| update(i, c));
    #[cfg(not(feature = "parallel"))]
    columns.iter_mut().enumerate().for_each(|(i, c)| update(i, c));
}

fn phase_inhibition(columns: &mut [Column], topology: &Topology, args: &Args) {
    let overlaps: Vec<f64> = columns.iter().map(|c| c.overlap).collect();
    let min_duty: Vec<f64> = columns.iter().map(|c| c.min_duty_cycle).collect();

    for c in 0..columns.len() {
        if overlaps[c] <= 0.0 || overlaps[c] <= min_duty[c] {
            columns[c].active = false;
            continue;
        }
        let neighbourhood = neighbourhood_indices(topology, c);
        let target_active = ((neighbourhood.len() as f64) * args.target_sparsity)
            .ceil()
            .max(1.0) as usize;
        let rank = neighbourhood
            .iter()
            .filter(|&&n| overlaps[n] > overlaps[c] || (overlaps[n] == overlaps[c] && n < c))
            .count();
        columns[c].active = rank < target_active;
    }
}

fn phase_permanence_update(
    columns: &mut [Column],
    synapses: &mut [ProximalSynapse],
    input: &[u8],
    topology: &Topology,
    args: &Args,
    syn_count: usize,
) {
    for c in 0..columns.len() {
        if !columns[c].active {
            continue;
        }
        let base = c * syn_count;
        for syn in &mut synapses[base..base + syn_count] {
            syn.permanence = if input[syn.target] != 0 {
                (syn.permanence + args.permanence_step).min(1.0)
            } else {
                (syn.permanence - args.permanence_step).max(0.0)
            };
        }
    }

    let p = args.duty_cycle_persistence;
    for col in columns.iter_mut() {
        let active_val = if col.active { 1.0 } else { 0.0 };
        col.active_duty_cycle = p * col.active_duty_cycle + (1.0 - p) * active_val;
        let overlap_val = if col.overlap > 0.0 { 1.0 } else { 0.0 };
        col.overlap_duty_cycle = p * col.overlap_duty_cycle + (1.0 - p) * overlap_val;
    }

    let active_duty_cycles: Vec<f64> = columns.iter().map(|c| c.active_duty_cycle).collect();
    for c in 0..columns.len() {
        let neighbourhood = neighbourhood_indices(topology, c);
        let max_adc = neighbourhood
            .iter()
            .map(|&n| active_duty_cycles[n])
            .fold(0.0_f64, f64::max);
        columns[c].min_duty_cycle = MIN_DUTY_CYCLE_FRACTION * max_adc;
    }

    let rescue_step = args.permanence_step * RESCUE_STEP_FRACTION;
    for c in 0..columns.len() {
        let col = &mut columns[c];
        if col.active_duty_cycle < col.min_duty_cycle {
            col.boost += args.boost_step;
        } else {
            col.boost = (col.boost - args.boost_step).max(1.0);
        }
        if col.overlap_duty_cycle < col.min_duty_cycle {
            let base = c * syn_count;
            for syn in &mut synapses[base..base + syn_count] {
                syn.permanence = (syn.permanence + rescue_step).min(1.0);
            }
        }
    }
}

fn phase_refine(
    columns: &[Column],
    synapses: &mut [ProximalSynapse],
    topology: &Topology,
    syn_count: usize,
    seed: (u32, u32),
) {
    let mut rng = crate::utils::seeded_rng(seed);
    for c in 0..columns.len() {
        let base = c * syn_count;
        for syn in &mut synapses[base..base + syn_count] {
            if syn.permanence <= 0.0 {
                syn.target = sample_target(topology, c, &mut rng);
                syn.permanence = SEED_PERMANENCE;
            }
        }
    }
    if columns.is_empty() {
        warn!("spatial pooler: refine kernel ran with zero columns");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Args;

    fn ctx(topology: &Topology, args: &Args) -> ComputeContext {
        ComputeContext::new(topology, args).unwrap()
    }

    fn seeded_pooler(ctx: &ComputeContext, topology: Topology, args: Args) -> SpatialPooler {
        SpatialPooler::seeded(ctx, topology, args, StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn test_invalid_shape_rejected() {
        let topology = Topology::line(80, 40, -1, -1);
        let args = Args::default();
        let mut c = ctx(&topology, &args);
        let mut sp = seeded_pooler(&c, topology, args);
        let bits = BitField::new(10);
        assert!(matches!(
            sp.write(&mut c, &bits, true),
            Err(CoreError::InvalidShape { .. })
        ));
    }

    #[test]
    fn test_write_produces_sparse_activation() {
        let topology = Topology::line(80, 40, -1, -1);
        let args = Args {
            column_proximal_synapse_count: 20,
            column_proximal_synapse_min_overlap: 2,
            ..Args::default()
        };
        let mut c = ctx(&topology, &args);
        let mut sp = seeded_pooler(&c, topology, args);
        let mut rng = StdRng::seed_from_u64(1);
        let mut bits = BitField::new(80);
        bits.random_set_pct(&mut rng, 0.3);

        let active = sp.write(&mut c, &bits, true).unwrap();
        assert!(active.num_set() > 0);
        assert!(active.num_set() <= 40);
    }

    #[test]
    fn test_permanences_stay_clamped() {
        let topology = Topology::line(30, 20, -1, -1);
        let args = Args {
            column_proximal_synapse_count: 15,
            column_proximal_synapse_min_overlap: 1,
            permanence_step: 0.3,
            ..Args::default()
        };
        let mut c = ctx(&topology, &args);
        let mut sp = seeded_pooler(&c, topology, args);
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..200 {
            let mut bits = BitField::new(30);
            bits.random_set_pct(&mut rng, 0.5);
            sp.write(&mut c, &bits, true).unwrap();
        }

        for syn in &sp.synapses {
            assert!((0.0..=1.0).contains(&syn.permanence));
        }
    }

    #[test]
    fn test_backwards_bounded_by_synapse_count() {
        let topology = Topology::line(30, 10, -1, -1);
        let args = Args {
            column_proximal_synapse_count: 5,
            column_proximal_synapse_min_overlap: 1,
            ..Args::default()
        };
        let c = ctx(&topology, &args);
        let sp = seeded_pooler(&c, topology, args);
        let mut all_active = BitField::new(10);
        all_active.set_all();

        let weights = sp.backwards(&all_active).unwrap();
        let max_possible = 10 * 5;
        assert!(weights.iter().all(|&w| (w as usize) <= max_possible));
    }

    #[test]
    fn test_receptive_field_radius_zero_converges_on_one_pixel() {
        let topology = Topology::local_inhibition_2d(10, 10, 10, 10, -1, 0);
        let args = Args {
            column_proximal_synapse_count: 8,
            ..Args::default()
        };
        let c = ctx(&topology, &args);
        let sp = seeded_pooler(&c, topology, args);
        let base = 0 * 8;
        let targets: Vec<usize> = sp.synapses[base..base + 8].iter().map(|s| s.target).collect();
        assert!(targets.iter().all(|&t| t == targets[0]));
    }

    #[test]
    fn test_refine_resets_counter() {
        let topology = Topology::line(20, 8, -1, -1);
        let args = Args {
            column_proximal_synapse_count: 5,
            column_proximal_synapse_min_overlap: 1,
            refine_interval: 3,
            ..Args::default()
        };
        let mut c = ctx(&topology, &args);
        let mut sp = seeded_pooler(&c, topology, args);
        let mut rng = StdRng::seed_from_u64(9);
        for i in 0..3 {
            let mut bits = BitField::new(20);
            bits.random_set_pct(&mut rng, 0.4);
            sp.write(&mut c, &bits, true).unwrap();
            if i < 2 {
                assert_ne!(sp.refine_counter, 0);
            }
        }
        assert_eq!(sp.refine_counter, 0);
    }
}
