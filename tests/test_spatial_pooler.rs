//! Integration tests for the spatial pooler's four-phase `write` pipeline.

use corticore::{Args, BitField, ComputeContext, SpatialPooler, Topology};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn context(topology: &Topology, args: &Args) -> ComputeContext {
    ComputeContext::new(topology, args).unwrap()
}

/// spec.md §8 scenario 1: wide random-input sweep keeps boost and duty cycle
/// within the documented bounds.
#[test]
fn test_random_input_sweep_keeps_stats_in_bounds() {
    let topology = Topology::line(80, 80, 5, 5);
    let args = Args {
        column_proximal_synapse_count: 5,
        column_proximal_synapse_min_overlap: 3,
        ..Args::default()
    };
    let mut ctx = context(&topology, &args);
    let mut sp = SpatialPooler::seeded(&ctx, topology, args, StdRng::seed_from_u64(1)).unwrap();
    let mut rng = StdRng::seed_from_u64(2);

    for _ in 0..2000 {
        let mut bits = BitField::new(80);
        bits.random_set_pct(&mut rng, 0.3);
        sp.write(&mut ctx, &bits, true).unwrap();
    }

    let stats = sp.stats();
    assert!(stats.average_boost >= 1.0);
    assert!(stats.average_duty_cycle >= 0.0 && stats.average_duty_cycle <= 1.0);
}

/// spec.md §8 scenario 2: a fixed alternating pattern should drive at least
/// one column's own `active_duty_cycle` to ~1.0, with that column's proximal
/// synapses targeting the pattern's "on" (odd-index) positions reaching
/// permanence >= 0.5. Checked on the single saturated column's own state,
/// not the population-average `stats()` (which would pass even if no column
/// actually saturated).
#[test]
fn test_fixed_alternating_pattern_saturates_a_column() {
    let topology = Topology::line(80, 80, 5, 5);
    let args = Args {
        column_proximal_synapse_count: 5,
        column_proximal_synapse_min_overlap: 3,
        ..Args::default()
    };
    let mut ctx = context(&topology, &args);
    let mut sp = SpatialPooler::seeded(&ctx, topology, args, StdRng::seed_from_u64(3)).unwrap();

    // [1,0,1,0,...]: bit at index i is on iff i is odd.
    let mut pattern = BitField::new(80);
    for i in (1..80).step_by(2) {
        pattern.set_bit(i);
    }

    for _ in 0..2000 {
        sp.write(&mut ctx, &pattern, true).unwrap();
    }

    let (saturated, duty) = (0..sp.columns())
        .map(|c| (c, sp.column_state(c).active_duty_cycle))
        .fold((0usize, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
    assert!(
        duty > 0.99,
        "expected some column's active_duty_cycle to saturate near 1.0, max was {duty}"
    );

    let odd_target_permanences: Vec<f64> = sp
        .synapses_of_column(saturated)
        .iter()
        .filter(|syn| syn.target % 2 == 1)
        .map(|syn| syn.permanence)
        .collect();
    assert!(
        !odd_target_permanences.is_empty(),
        "saturated column has no synapses targeting odd input positions"
    );
    assert!(
        odd_target_permanences.iter().all(|&p| p >= 0.5),
        "expected odd-target synapse permanences >= 0.5 on column {saturated}, got {odd_target_permanences:?}"
    );
}

/// spec.md §8 scenario 4: invalid buffer length returns `InvalidShape`.
#[test]
fn test_invalid_buffer_length_rejected() {
    let topology = Topology::line(80, 80, 5, 5);
    let args = Args::default();
    let mut ctx = context(&topology, &args);
    let mut sp = SpatialPooler::new(&ctx, topology, args).unwrap();
    let bad = BitField::new(10);
    assert!(sp.write(&mut ctx, &bad, true).is_err());
}

/// spec.md §8 scenario 6: after `refine_interval` writes the refine kernel
/// runs once, reseeding collapsed-permanence synapses. Probed directly via
/// the total permanence-zero synapse count before/after the refine-triggering
/// write, per spec.md:159 — `clipped_normal(0.2, 0.2, 0, 1)` initialisation
/// already clamps a chunk of synapses to exactly 0.0, so the "before" count
/// is nonzero without needing any decaying writes first.
#[test]
fn test_refine_reseeds_collapsed_synapses() {
    let topology = Topology::line(20, 10, -1, -1);
    let args = Args {
        column_proximal_synapse_count: 30,
        column_proximal_synapse_min_overlap: 1,
        permanence_step: 0.5,
        refine_interval: 3,
        ..Args::default()
    };
    let mut ctx = context(&topology, &args);
    let mut sp = SpatialPooler::seeded(&ctx, topology, args, StdRng::seed_from_u64(4)).unwrap();

    let zero_permanence_count = |sp: &SpatialPooler| -> usize {
        (0..sp.columns())
            .flat_map(|c| sp.synapses_of_column(c).iter().map(|syn| syn.permanence))
            .filter(|&p| p <= 0.0)
            .count()
    };

    let before = zero_permanence_count(&sp);
    assert!(
        before > 0,
        "expected clipped-normal initialisation to leave some synapses at permanence 0.0"
    );

    let all_zero = BitField::new(20);
    for _ in 0..3 {
        sp.write(&mut ctx, &all_zero, true).unwrap();
    }

    let after = zero_permanence_count(&sp);
    assert_eq!(
        after, 0,
        "refine kernel should have reseeded every permanence-zero synapse by now"
    );
}

/// spec.md §8: receptive-field radius 0 makes every synapse on a column
/// converge on the single projected input pixel.
#[test]
fn test_zero_radius_receptive_field_converges() {
    let topology = Topology::local_inhibition_2d(16, 16, 16, 16, -1, 0);
    let args = Args {
        column_proximal_synapse_count: 6,
        ..Args::default()
    };
    let ctx = context(&topology, &args);
    let sp = SpatialPooler::seeded(&ctx, topology, args, StdRng::seed_from_u64(5)).unwrap();
    let weights = sp
        .backwards(&{
            let mut one_col = BitField::new(sp.columns());
            one_col.set_bit(5);
            one_col
        })
        .unwrap();
    assert_eq!(weights.iter().filter(|&&w| w > 0).count(), 1);
}
