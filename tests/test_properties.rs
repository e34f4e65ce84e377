//! Property-based tests for the invariants listed in spec.md §8.

use corticore::{Args, BitField, ComputeContext, Region, SpatialPooler, TemporalPooler, Topology};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn context(topology: &Topology, args: &Args) -> ComputeContext {
    ComputeContext::new(topology, args).unwrap()
}

proptest! {
    /// For every proximal synapse after any number of writes: `0 <= permanence <= 1`.
    #[test]
    fn prop_proximal_permanences_stay_clamped(
        seeds in prop::collection::vec(0u64..10_000, 1..30),
        fill_pct in 0.05f64..0.6,
    ) {
        let topology = Topology::line(40, 20, -1, -1);
        let args = Args {
            column_proximal_synapse_count: 8,
            column_proximal_synapse_min_overlap: 2,
            ..Args::default()
        };
        let ctx = context(&topology, &args);
        let mut sp = SpatialPooler::seeded(&ctx, topology, args, StdRng::seed_from_u64(0)).unwrap();
        let mut ctx = ctx;

        for seed in seeds {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut bits = BitField::new(40);
            bits.random_set_pct(&mut rng, fill_pct);
            sp.write(&mut ctx, &bits, true).unwrap();
        }

        let weights = sp.backwards(&{
            let mut all = BitField::new(sp.columns());
            all.set_all();
            all
        }).unwrap();
        prop_assert!(weights.iter().all(|&w| w <= (sp.columns() * args.column_proximal_synapse_count) as u32));
    }

    /// After any write, active columns <= ceil(0.04 * Columns) * 1.5 under
    /// global inhibition with default target sparsity.
    #[test]
    fn prop_sparsity_upper_bound_holds(fill_pct in 0.05f64..0.9) {
        let topology = Topology::line(200, 100, -1, -1);
        let args = Args {
            column_proximal_synapse_count: 10,
            column_proximal_synapse_min_overlap: 2,
            ..Args::default()
        };
        let ctx = context(&topology, &args);
        let mut sp = SpatialPooler::seeded(&ctx, topology, args, StdRng::seed_from_u64(1)).unwrap();
        let mut ctx = ctx;
        let mut rng = StdRng::seed_from_u64(2);
        let mut bits = BitField::new(200);
        bits.random_set_pct(&mut rng, fill_pct);

        let active = sp.write(&mut ctx, &bits, true).unwrap();
        let bound = ((0.04 * topology.columns() as f64).ceil() * 1.5) as usize;
        prop_assert!(active.num_set() <= bound);
    }

    /// State-bit monotonicity: after one write, each cell's prev bit-trio
    /// equals its previous now bit-trio (spec.md §8). Asserted directly on
    /// `cell_raw_state`'s bit layout (bits 0-2 = now, 4-6 = prev), mirroring
    /// `test_state_bit_monotonicity` in src/temporal_pooler.rs.
    #[test]
    fn prop_state_bit_monotonicity(active_col in 0usize..8) {
        let topology = Topology::line(10, 8, -1, -1);
        let args = Args::default();
        let ctx = context(&topology, &args);
        let mut tp = TemporalPooler::seeded(&ctx, topology, args, StdRng::seed_from_u64(3)).unwrap();
        let mut ctx = ctx;

        let mut pattern = BitField::new(8);
        pattern.set_bit(active_col);

        tp.write(&mut ctx, &pattern, true).unwrap();
        let now_before: Vec<u8> = (0..tp.cell_count())
            .map(|i| tp.cell_raw_state(i) & 0b111)
            .collect();

        tp.write(&mut ctx, &pattern, true).unwrap();
        for (i, now) in now_before.iter().enumerate() {
            let prev_after = (tp.cell_raw_state(i) >> 4) & 0b111;
            prop_assert_eq!(prev_after, *now);
        }
    }
}

/// Idempotence of time-step: writing all-zero input repeatedly drives active
/// and learning cell counts to zero after a transient.
#[test]
fn test_all_zero_idempotence_through_region() {
    let topology = Topology::line(20, 10, -1, -1);
    let mut region = Region::new(topology, Args::default()).unwrap();
    let zeros = BitField::new(20);

    for _ in 0..5 {
        region.write(&zeros, true, true).unwrap();
    }

    let stats = region.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.learning, 0);
}
