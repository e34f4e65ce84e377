//! Temporal pooler: learns sequences over column activations and produces
//! per-column predictions.
//!
//! Implements spec.md §4.2's four kernels (time-step, active-state,
//! predictive-state, synapse-update) over flat cell/segment/synapse buffers.
//! Cell state is an 8-bit bitmask; bits 0-2 hold "now", bits 4-6 hold "prev"
//! (spec.md §3's cell state-bit table).

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::args::Args;
use crate::bitfield::BitField;
use crate::compute::ComputeContext;
use crate::error::{CoreError, Result};
use crate::topology::Topology;
use crate::utils::{min, shuffle_indices};

const ACTIVE_NOW: u8 = 1 << 0;
const PREDICTIVE_NOW: u8 = 1 << 1;
const LEARNING_NOW: u8 = 1 << 2;
const ACTIVE_PREV: u8 = 1 << 4;
const PREDICTIVE_PREV: u8 = 1 << 5;
const LEARNING_PREV: u8 = 1 << 6;
const NOW_MASK: u8 = ACTIVE_NOW | PREDICTIVE_NOW | LEARNING_NOW;

/// Permanence a newly grown distal synapse commits at.
const INITIAL_DISTAL_PERMANENCE: f64 = 0.2;

/// One cell's 8-bit state (see module docs) plus how many of its distal
/// segments are currently allocated.
#[derive(Clone, Copy, Debug, Default)]
pub struct Cell {
    /// Active/predictive/learning bits for now (0-2) and prev (4-6).
    pub state: u8,
    /// Number of segments in use (`<= Args::cell_segment_count`).
    pub segment_count: u8,
}

/// A distal segment's activity grids, indexed `[kind][time]` where kind 0 is
/// "active", kind 1 is "learn", and time 0 is "now", 1 is "prev".
#[derive(Clone, Copy, Debug, Default)]
pub struct Segment {
    /// Connected-synapse activity counts.
    pub activity: [[u8; 2]; 2],
    /// Activity counts ignoring the connected-permanence threshold.
    pub full_activity: [[u8; 2]; 2],
    /// Whether this segment correctly predicted the cell's last activation.
    pub sequence_segment: bool,
    /// Queued value for `sequence_segment`, committed in phase 3.
    pub sequence_segment_queued: bool,
    /// Whether any synapse on this segment has a pending permanence change.
    pub has_queued_changes: bool,
    /// EMA of how often this segment has driven its cell active.
    pub active_duty_cycle: f64,
}

/// A distal synapse connecting a segment to another cell.
#[derive(Clone, Copy, Debug)]
pub struct DistalSynapse {
    /// Connection strength in `[0, 1]`.
    pub permanence: f64,
    /// Queued permanence, committed or discarded in phase 3.
    pub permanence_queued: f64,
    /// Target column, or `-1` for an unused synapse slot.
    pub target_column: i32,
    /// Target cell index within `target_column`.
    pub target_cell: u8,
    /// Snapshot of the target cell's state, refreshed each predictive-state
    /// phase (mirrors the original engine's GPU-kernel access pattern).
    pub target_cell_state: u8,
    /// Whether this synapse has a pending (uncommitted) permanence change.
    pub queued: bool,
}

impl Default for DistalSynapse {
    fn default() -> Self {
        DistalSynapse {
            permanence: 0.0,
            permanence_queued: 0.0,
            target_column: -1,
            target_cell: 0,
            target_cell_state: 0,
            queued: false,
        }
    }
}

/// Aggregate temporal-pooler statistics (spec.md §4.2 `stats()`, enriched per
/// SPEC_FULL.md §B.4 with capacity-utilisation fields).
#[derive(Clone, Copy, Debug, Default)]
pub struct TemporalStats {
    /// Cells currently active.
    pub active: usize,
    /// Cells currently predictive.
    pub predictive: usize,
    /// Cells currently learning.
    pub learning: usize,
    /// Mean segment active-duty-cycle across allocated segments.
    pub average_segment_duty_cycle: f64,
    /// Segments currently allocated across all cells.
    pub total_segments: usize,
    /// Segment capacity (`cells * cell_segment_count`).
    pub max_segments: usize,
    /// Distal synapses currently wired (target_column >= 0).
    pub total_synapses: usize,
    /// Synapse capacity (`total segment capacity * segment_synapse_count`).
    pub max_synapses: usize,
}

/// The temporal-pooling engine: cell/segment/distal-synapse buffers and the
/// four-phase `write` pipeline.
pub struct TemporalPooler {
    topology: Topology,
    args: Args,
    cells: Vec<Cell>,
    segments: Vec<Segment>,
    synapses: Vec<DistalSynapse>,
    host_rng: StdRng,
    /// Ticks on every `write`; reserved for a future segment-refine pass
    /// (spec.md §9 notes the field but leaves its effect unspecified).
    refine_counter: u32,
}

impl TemporalPooler {
    /// Construct a pooler and run the `initRegion` kernel (all cells/segments
    /// start empty; distal synapses are grown lazily by the active-state
    /// phase, so there is no random wiring to seed here).
    pub fn new(ctx: &ComputeContext, topology: Topology, args: Args) -> Result<Self> {
        Self::seeded(ctx, topology, args, StdRng::from_entropy())
    }

    /// Construct a pooler with an explicit host RNG, for deterministic tests.
    pub fn seeded(
        ctx: &ComputeContext,
        topology: Topology,
        args: Args,
        host_rng: StdRng,
    ) -> Result<Self> {
        args.validate()?;
        let columns = topology.columns();
        let cells_n = columns * args.column_cell_count;
        let segments_n = cells_n * args.cell_segment_count;
        let synapses_n = segments_n * args.segment_synapse_count;

        info!(
            "TemporalPooler: {} columns, {} cells/column, {} segments/cell, {} synapses/segment, device {:?}",
            columns,
            args.column_cell_count,
            args.cell_segment_count,
            args.segment_synapse_count,
            ctx.device()
        );

        Ok(TemporalPooler {
            topology,
            args,
            cells: vec![Cell::default(); cells_n],
            segments: vec![Segment::default(); segments_n],
            synapses: vec![DistalSynapse::default(); synapses_n],
            host_rng,
            refine_counter: 0,
        })
    }

    /// Run the four-phase pipeline, returning the per-column "is-predicted"
    /// bit vector. `learning` gates phase 3's commit of queued synapse
    /// changes and segment growth (SPEC_FULL.md §B.1); the output is always
    /// computed from the (possibly learning-free) predictive state.
    pub fn write(
        &mut self,
        ctx: &mut ComputeContext,
        column_activations: &BitField,
        learning: bool,
    ) -> Result<BitField> {
        if column_activations.num_bits() != self.topology.columns() {
            return Err(CoreError::InvalidShape {
                expected: self.topology.columns(),
                actual: column_activations.num_bits(),
            });
        }
        let n = self.cells.len();

        ctx.queue_mut().log_dispatch("time_step", n);
        phase_time_step(&mut self.cells, &mut self.segments);

        ctx.queue_mut().log_dispatch("compute_active_state", n);
        let seed = (self.host_rng.gen::<u32>(), self.host_rng.gen::<u32>());
        phase_active_state(
            column_activations,
            &mut self.cells,
            &mut self.segments,
            &mut self.synapses,
            &self.args,
            seed,
        );

        ctx.queue_mut().log_dispatch("compute_predictive_state", n);
        phase_predictive_state(&mut self.cells, &mut self.segments, &mut self.synapses, &self.args);

        if learning {
            ctx.queue_mut().log_dispatch("update_synapses", n);
            phase_synapse_update(&mut self.cells, &mut self.segments, &mut self.synapses, &self.args);
        }

        self.refine_counter = self.refine_counter.wrapping_add(1);

        ctx.queue().finish();
        Ok(compute_column_predictions(&self.cells, &self.topology, &self.args))
    }

    /// Number of cells (`columns * column_cell_count`).
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Raw 8-bit state for one cell (test/inspection hook; see module docs
    /// for the bit layout — 0-2 hold "now", 4-6 hold "prev").
    pub fn cell_raw_state(&self, idx: usize) -> u8 {
        self.cells[idx].state
    }

    /// Cells currently active / predictive / learning, and average segment
    /// active-duty-cycle, plus capacity-utilisation counters.
    pub fn stats(&self) -> TemporalStats {
        let mut stats = TemporalStats {
            max_segments: self.segments.len(),
            max_synapses: self.synapses.len(),
            ..Default::default()
        };
        for cell in &self.cells {
            if cell.state & ACTIVE_NOW != 0 {
                stats.active += 1;
            }
            if cell.state & PREDICTIVE_NOW != 0 {
                stats.predictive += 1;
            }
            if cell.state & LEARNING_NOW != 0 {
                stats.learning += 1;
            }
            stats.total_segments += cell.segment_count as usize;
        }
        stats.total_synapses = self
            .synapses
            .iter()
            .filter(|s| s.target_column >= 0)
            .count();

        if stats.total_segments > 0 {
            let sum: f64 = self
                .segments
                .iter()
                .zip(allocated_mask(&self.cells, &self.args))
                .filter(|(_, used)| *used)
                .map(|(s, _)| s.active_duty_cycle)
                .sum();
            stats.average_segment_duty_cycle = sum / stats.total_segments as f64;
        }
        stats
    }
}

/// True for each segment slot that is within its cell's allocated range.
fn allocated_mask(cells: &[Cell], args: &Args) -> Vec<bool> {
    let mut mask = vec![false; cells.len() * args.cell_segment_count];
    for (cell_idx, cell) in cells.iter().enumerate() {
        let base = cell_idx * args.cell_segment_count;
        for si in 0..cell.segment_count as usize {
            mask[base + si] = true;
        }
    }
    mask
}

fn phase_time_step(cells: &mut [Cell], segments: &mut [Segment]) {
    for cell in cells.iter_mut() {
        let now = cell.state & NOW_MASK;
        cell.state = (cell.state & !(NOW_MASK << 4)) | (now << 4);
        cell.state &= !NOW_MASK;
    }
    for seg in segments.iter_mut() {
        seg.activity[0][1] = seg.activity[0][0];
        seg.activity[0][0] = 0;
        seg.activity[1][1] = seg.activity[1][0];
        seg.activity[1][0] = 0;
        seg.full_activity[0][1] = seg.full_activity[0][0];
        seg.full_activity[0][0] = 0;
        seg.full_activity[1][1] = seg.full_activity[1][0];
        seg.full_activity[1][0] = 0;
    }
}

fn phase_active_state(
    column_activations: &BitField,
    cells: &mut [Cell],
    segments: &mut [Segment],
    synapses: &mut [DistalSynapse],
    args: &Args,
    seed: (u32, u32),
) {
    let mut rng = crate::utils::seeded_rng(seed);
    let cell_count = args.column_cell_count;
    let seg_count = args.cell_segment_count;

    for col in 0..column_activations.num_bits() {
        if column_activations.get_bit(col) == 0 {
            continue;
        }
        let cell_base = col * cell_count;

        let mut predicted_cells = Vec::new();
        for ci in 0..cell_count {
            let cell_idx = cell_base + ci;
            let seg_base = cell_idx * seg_count;
            let used = cells[cell_idx].segment_count as usize;
            let qualifies = segments[seg_base..seg_base + used]
                .iter()
                .any(|seg| seg.sequence_segment && seg.activity[0][1] as usize >= args.segment_activation_threshold);
            if qualifies {
                predicted_cells.push(ci);
            }
        }

        if !predicted_cells.is_empty() {
            for ci in predicted_cells {
                let cell_idx = cell_base + ci;
                cells[cell_idx].state |= ACTIVE_NOW;
                let seg_base = cell_idx * seg_count;
                let used = cells[cell_idx].segment_count as usize;
                let learns = segments[seg_base..seg_base + used].iter().any(|seg| {
                    seg.sequence_segment && seg.activity[1][1] as usize >= args.segment_activation_threshold
                });
                if learns {
                    cells[cell_idx].state |= LEARNING_NOW;
                }
            }
            continue;
        }

        // Bursting: no segment predicted this column, so every cell fires.
        for ci in 0..cell_count {
            cells[cell_base + ci].state |= ACTIVE_NOW;
        }

        let mut best: Option<(usize, u8)> = None;
        for ci in 0..cell_count {
            let cell_idx = cell_base + ci;
            let seg_base = cell_idx * seg_count;
            let used = cells[cell_idx].segment_count as usize;
            for seg in &segments[seg_base..seg_base + used] {
                let fa = seg.full_activity[0][1];
                if fa as usize >= args.segment_min_threshold
                    && best.map_or(true, |(_, best_fa)| fa > best_fa)
                {
                    best = Some((ci, fa));
                }
            }
        }
        let learn_ci = match best {
            Some((ci, _)) => ci,
            None => (0..cell_count)
                .min_by_key(|&ci| cells[cell_base + ci].segment_count)
                .unwrap_or(0),
        };
        cells[cell_base + learn_ci].state |= LEARNING_NOW;
        queue_new_segment(cell_base + learn_ci, cells, segments, synapses, args, &mut rng);
    }
}

/// Populate a free segment slot on `cell_idx` with up to
/// `segment_synapse_count` synapses sampled from cells that were learning
/// last step. Drops silently (with a `warn!`) if the cell is already at
/// capacity, per spec.md §4.2's failure semantics.
fn queue_new_segment(
    cell_idx: usize,
    cells: &[Cell],
    segments: &mut [Segment],
    synapses: &mut [DistalSynapse],
    args: &Args,
    rng: &mut StdRng,
) {
    let seg_slot = cells[cell_idx].segment_count as usize;
    if seg_slot >= args.cell_segment_count {
        warn!(
            "temporal pooler: cell {cell_idx} cannot grow a new segment, already holds {} segments",
            args.cell_segment_count
        );
        return;
    }

    let mut learning_prev_cells: Vec<usize> = cells
        .iter()
        .enumerate()
        .filter(|(_, c)| c.state & LEARNING_PREV != 0)
        .map(|(i, _)| i)
        .collect();
    if learning_prev_cells.is_empty() {
        return;
    }
    shuffle_indices(&mut learning_prev_cells, rng);

    let seg_idx = cell_idx * args.cell_segment_count + seg_slot;
    let syn_base = seg_idx * args.segment_synapse_count;
    let sample_count = min(args.segment_synapse_count, learning_prev_cells.len());

    for (s, &target_cell_idx) in learning_prev_cells.iter().take(sample_count).enumerate() {
        let syn = &mut synapses[syn_base + s];
        syn.target_column = (target_cell_idx / args.column_cell_count) as i32;
        syn.target_cell = (target_cell_idx % args.column_cell_count) as u8;
        syn.permanence_queued = INITIAL_DISTAL_PERMANENCE;
        syn.queued = true;
    }
    segments[seg_idx].sequence_segment_queued = true;
    segments[seg_idx].has_queued_changes = true;
}

fn phase_predictive_state(
    cells: &mut [Cell],
    segments: &mut [Segment],
    synapses: &mut [DistalSynapse],
    args: &Args,
) {
    for syn in synapses.iter_mut() {
        if syn.target_column >= 0 {
            let idx = syn.target_column as usize * args.column_cell_count + syn.target_cell as usize;
            syn.target_cell_state = cells[idx].state;
        }
    }

    let seg_count = args.cell_segment_count;
    let syn_count = args.segment_synapse_count;

    for cell_idx in 0..cells.len() {
        let seg_base = cell_idx * seg_count;
        let used = cells[cell_idx].segment_count as usize;
        let mut became_predictive = false;

        for si in 0..used {
            let seg_idx = seg_base + si;
            let syn_base = seg_idx * syn_count;

            let mut active_now = 0u32;
            let mut full_active_now = 0u32;
            let mut learn_now = 0u32;
            let mut full_learn_now = 0u32;
            for syn in &synapses[syn_base..syn_base + syn_count] {
                if syn.target_column < 0 {
                    continue;
                }
                let st = syn.target_cell_state;
                let active = st & ACTIVE_NOW != 0;
                let learning = st & LEARNING_NOW != 0;
                let connected = syn.permanence >= args.connected_permanence;
                if active {
                    full_active_now += 1;
                    if connected {
                        active_now += 1;
                    }
                }
                if learning {
                    full_learn_now += 1;
                    if connected {
                        learn_now += 1;
                    }
                }
            }

            segments[seg_idx].activity[0][0] = active_now as u8;
            segments[seg_idx].full_activity[0][0] = full_active_now as u8;
            segments[seg_idx].activity[1][0] = learn_now as u8;
            segments[seg_idx].full_activity[1][0] = full_learn_now as u8;

            let meets_threshold = active_now as usize >= args.segment_activation_threshold;
            let weak_match = full_active_now as usize >= args.segment_min_threshold;
            if meets_threshold {
                became_predictive = true;
            }

            if meets_threshold || weak_match {
                for syn in &mut synapses[syn_base..syn_base + syn_count] {
                    if syn.target_column < 0 {
                        continue;
                    }
                    let active = syn.target_cell_state & ACTIVE_NOW != 0;
                    syn.permanence_queued = if active {
                        (syn.permanence + args.permanence_step).min(1.0)
                    } else {
                        (syn.permanence - args.permanence_step).max(0.0)
                    };
                    syn.queued = true;
                }
                segments[seg_idx].has_queued_changes = true;
            }
        }

        if became_predictive {
            cells[cell_idx].state |= PREDICTIVE_NOW;
        }
    }
}

fn phase_synapse_update(
    cells: &mut [Cell],
    segments: &mut [Segment],
    synapses: &mut [DistalSynapse],
    args: &Args,
) {
    let seg_count = args.cell_segment_count;
    let syn_count = args.segment_synapse_count;
    let p = args.duty_cycle_persistence;

    for cell_idx in 0..cells.len() {
        let learning_now = cells[cell_idx].state & LEARNING_NOW != 0;
        let predictive_now = cells[cell_idx].state & PREDICTIVE_NOW != 0;
        let predictive_prev = cells[cell_idx].state & PREDICTIVE_PREV != 0;
        let active_now = cells[cell_idx].state & ACTIVE_NOW != 0;
        let seg_base = cell_idx * seg_count;

        for si in 0..seg_count {
            let seg_idx = seg_base + si;
            if !segments[seg_idx].has_queued_changes {
                continue;
            }
            let syn_base = seg_idx * syn_count;

            if learning_now {
                for syn in &mut synapses[syn_base..syn_base + syn_count] {
                    if syn.queued {
                        syn.permanence = syn.permanence_queued.clamp(0.0, 1.0);
                    }
                }
                if segments[seg_idx].sequence_segment_queued {
                    // At most one sequence segment per cell (spec.md §3 invariant).
                    for other in seg_base..seg_base + seg_count {
                        segments[other].sequence_segment = false;
                    }
                    segments[seg_idx].sequence_segment = true;
                }
                let grew = si == cells[cell_idx].segment_count as usize
                    && synapses[syn_base..syn_base + syn_count]
                        .iter()
                        .any(|s| s.target_column >= 0);
                if grew {
                    cells[cell_idx].segment_count += 1;
                }
            } else if !predictive_now && predictive_prev {
                for syn in &mut synapses[syn_base..syn_base + syn_count] {
                    if syn.target_column >= 0 && syn.permanence_queued > syn.permanence {
                        syn.permanence = (syn.permanence - args.permanence_step).max(0.0);
                    }
                }
            }

            segments[seg_idx].sequence_segment_queued = false;
            segments[seg_idx].has_queued_changes = false;
            for syn in &mut synapses[syn_base..syn_base + syn_count] {
                syn.queued = false;
            }

            let caused_active =
                active_now && segments[seg_idx].activity[0][0] as usize >= args.segment_activation_threshold;
            segments[seg_idx].active_duty_cycle =
                p * segments[seg_idx].active_duty_cycle + (1.0 - p) * if caused_active { 1.0 } else { 0.0 };
        }
    }
}

fn compute_column_predictions(cells: &[Cell], topology: &Topology, args: &Args) -> BitField {
    let mut out = BitField::new(topology.columns());
    for col in 0..topology.columns() {
        let base = col * args.column_cell_count;
        let predicted = (0..args.column_cell_count).any(|ci| cells[base + ci].state & PREDICTIVE_NOW != 0);
        if predicted {
            out.set_bit(col);
        }
    }
    out
}
