//! corticore — a two-stage Hierarchical Temporal Memory cortical learning
//! engine: a spatial pooler that maps dense binary input patterns into
//! sparse, noise-tolerant column activations, and a temporal pooler that
//! learns sequences over those activations and produces per-column
//! predictions.
//!
//! # Key characteristics
//!
//! - Massively data-parallel design: every column, cell, segment, and
//!   synapse is modelled so it can advance concurrently per time step.
//! - Flat struct-of-arrays buffers (`buf[entity_index * stride + local_index]`)
//!   rather than arrays-of-structs, for cache behaviour and to mirror a
//!   GPU-kernel layout.
//! - Online, unsupervised learning: no training/inference mode distinction,
//!   no persisted model state beyond the `Topology`/`Args` configuration.
//!
//! # Architecture
//!
//! - [`compute`]: the host/device split — [`compute::ComputeContext`],
//!   [`compute::CommandQueue`], [`compute::DeviceBuffer`].
//! - [`topology`] / [`args`]: immutable region geometry and learning
//!   hyper-parameters, serialisable to JSON and to kernel-constant source.
//! - [`spatial_pooler`]: column + proximal-synapse buffers, four kernels.
//! - [`temporal_pooler`]: cell + distal-segment + distal-synapse buffers,
//!   four kernels.
//! - [`region`]: composes both poolers behind one `write`/`backwards`/`stats`
//!   façade.
//! - [`bitfield`]: the dense bit-vector type used for every SDR in the
//!   pipeline (inputs, column activations, predictions).
//! - [`error`]: a single `CoreError` enum and `status → name` translation
//!   table.
//!
//! # Example
//!
//! ```
//! use corticore::{Args, BitField, Region, Topology};
//!
//! let topology = Topology::line(40, 20, -1, -1);
//! let args = Args {
//!     column_proximal_synapse_count: 10,
//!     column_proximal_synapse_min_overlap: 2,
//!     ..Args::default()
//! };
//! let mut region = Region::new(topology, args).unwrap();
//!
//! let mut input = BitField::new(40);
//! input.set_bit(3);
//! input.set_bit(17);
//!
//! let predictions = region.write(&input, true, true).unwrap();
//! assert_eq!(predictions.num_bits(), topology.columns());
//! ```

pub mod args;
pub mod bitfield;
pub mod compute;
pub mod error;
pub mod region;
pub mod spatial_pooler;
pub mod temporal_pooler;
pub mod topology;
pub mod utils;

pub use args::Args;
pub use bitfield::{bitfield_copy_words, BitField, Word, BITS_PER_WORD};
pub use compute::{CommandQueue, ComputeContext, Device, DeviceBuffer};
pub use error::{status_to_name, CoreError, Result};
pub use region::{Region, Stats};
pub use spatial_pooler::{SpatialPooler, SpatialStats};
pub use temporal_pooler::{TemporalPooler, TemporalStats};
pub use topology::Topology;
