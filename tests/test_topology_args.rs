//! Integration tests for `Topology` and `Args` configuration loading.

use corticore::{Args, CoreError, Topology};
use tempfile_free::temp_json_path;

mod tempfile_free {
    use std::path::PathBuf;

    /// A throwaway path inside the OS temp dir, unique per call.
    pub fn temp_json_path(tag: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "corticore_test_{tag}_{}.json",
            std::process::id()
        ));
        p
    }
}

#[test]
fn test_topology_roundtrip_through_disk() {
    let topology = Topology::local_inhibition_2d(32, 32, 16, 16, 3, 4);
    let path = temp_json_path("topology");
    topology.save(&path).unwrap();
    let loaded = Topology::load(&path).unwrap();
    assert_eq!(topology, loaded);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_args_roundtrip_through_disk() {
    let args = Args {
        target_sparsity: 0.08,
        refine_interval: 50,
        ..Args::default()
    };
    let path = temp_json_path("args");
    args.save(&path).unwrap();
    let loaded = Args::load(&path).unwrap();
    assert_eq!(args, loaded);
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_args_load_rejects_invalid_file_contents() {
    let path = temp_json_path("args_invalid");
    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(Args::load(&path), Err(CoreError::Serialization(_))));
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_args_load_rejects_out_of_domain_values() {
    let path = temp_json_path("args_out_of_domain");
    let mut args = Args::default();
    args.segment_min_threshold = 999;
    args.save(&path).unwrap();
    assert!(matches!(
        Args::load(&path),
        Err(CoreError::InvalidParameter(_))
    ));
    std::fs::remove_file(&path).ok();
}

#[test]
fn test_kernel_constants_combine_topology_and_args() {
    let topology = Topology::line(80, 80, 5, 5);
    let args = Args::default();
    let combined = corticore::compute::kernel::render_constants(&topology, &args);
    assert!(combined.contains("INPUT_WIDTH"));
    assert!(combined.contains("SEGMENT_MIN_THRESHOLD"));
}
