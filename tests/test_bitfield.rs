//! Integration tests for the `BitField` dense bit-vector type.

use corticore::BitField;
use rand::rngs::StdRng;
use rand::SeedableRng;

#[test]
fn test_set_clear_toggle_roundtrip() {
    let mut bf = BitField::new(64);
    bf.set_bit(3);
    bf.set_bit(40);
    assert_eq!(bf.num_set(), 2);
    bf.clear_bit(3);
    assert_eq!(bf.num_set(), 1);
    bf.toggle_bit(3);
    assert_eq!(bf.num_set(), 2);
}

#[test]
fn test_bitwise_and_or_xor() {
    let mut a = BitField::new(16);
    let mut b = BitField::new(16);
    a.set_bit(1);
    a.set_bit(2);
    b.set_bit(2);
    b.set_bit(3);

    let and = &a & &b;
    assert_eq!(and.get_acts(), vec![2]);

    let or = &a | &b;
    assert_eq!(or.get_acts(), vec![1, 2, 3]);

    let xor = &a ^ &b;
    assert_eq!(xor.get_acts(), vec![1, 3]);
}

#[test]
fn test_random_set_pct_targets_fraction() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut bf = BitField::new(2000);
    bf.random_set_pct(&mut rng, 0.1);
    assert!(bf.num_set() >= 150 && bf.num_set() <= 250);
}

#[test]
fn test_set_all_clear_all() {
    let mut bf = BitField::new(100);
    bf.set_all();
    assert_eq!(bf.num_set(), 100);
    bf.clear_all();
    assert_eq!(bf.num_set(), 0);
}

#[test]
fn test_equality_across_word_boundary() {
    let mut a = BitField::new(100);
    let mut b = BitField::new(100);
    a.set_bit(99);
    assert_ne!(a, b);
    b.set_bit(99);
    assert_eq!(a, b);
}
