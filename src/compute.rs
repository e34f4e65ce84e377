//! Compute context, command queue, and typed device buffers.
//!
//! Models the host/device split of spec.md §5 on a single CPU backend: a
//! [`ComputeContext`] owns a chosen [`Device`] and a [`CommandQueue`] that
//! serialises kernel dispatch; [`DeviceBuffer<T>`] pairs a host-shadow `Vec<T>`
//! with `upload`/`download` that simulate the blocking/non-blocking transfer
//! contract a real accelerator backend would need. A future GPU backend slots
//! in behind the same `Device`/`ComputeContext` surface (spec.md §6: "any
//! implementation may substitute a CPU-side data-parallel backend").

use log::{debug, info};

use crate::args::Args;
use crate::error::{CoreError, Result};
use crate::topology::Topology;

/// The compute device backing a [`ComputeContext`].
///
/// Only [`Device::Cpu`] is implemented today; the enum is kept open so a
/// future accelerator backend can be added without changing the public API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Device {
    /// Data-parallel CPU backend (Rayon-driven when the `parallel` feature is
    /// enabled, sequential otherwise).
    Cpu,
}

/// Orders kernel dispatch so that kernel *k* always completes before kernel
/// *k+1* starts (spec.md §5's "happens-before edge" guarantee).
///
/// The CPU backend has no real asynchronous device queue; `finish()` is a
/// no-op but is still the one function `write()` calls before reading output
/// buffers back, so the synchronisation point in the code matches the one in
/// the design even though nothing here actually blocks.
#[derive(Debug, Default)]
pub struct CommandQueue {
    dispatched: u64,
}

impl CommandQueue {
    fn new() -> Self {
        CommandQueue { dispatched: 0 }
    }

    /// Record a kernel launch for diagnostics; logs work-item count at debug
    /// level, mirroring a GPU launch log (SPEC_FULL.md §A.2).
    pub fn log_dispatch(&mut self, kernel: &str, work_items: usize) {
        self.dispatched += 1;
        debug!("kernel `{kernel}` dispatched over {work_items} work items");
    }

    /// The synchronisation point: blocks (conceptually) until every prior
    /// dispatch has completed. On the CPU backend this is a no-op since
    /// dispatch already executed synchronously.
    pub fn finish(&self) {}

    /// Total kernels dispatched through this queue so far.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatched
    }
}

/// Owns a [`Device`], a context marker, and a [`CommandQueue`].
///
/// Shared (by reference) between the spatial and temporal poolers that a
/// [`crate::region::Region`] composes; per spec.md §5, no user of this
/// library may call into a region from two threads concurrently.
pub struct ComputeContext {
    device: Device,
    queue: CommandQueue,
}

impl ComputeContext {
    /// Construct a context backed by the given device.
    ///
    /// Returns [`CoreError::NoDevice`] for any device variant this backend
    /// does not implement (today, anything other than [`Device::Cpu`] — the
    /// hook exists for a future accelerator backend).
    pub fn with_device(device: Device, topology: &Topology, args: &Args) -> Result<Self> {
        match device {
            Device::Cpu => {
                let footprint = estimate_footprint(topology, args);
                info!(
                    "ComputeContext: CPU backend, estimated buffer footprint {footprint} bytes \
                     for {} columns / {} input bits",
                    topology.columns(),
                    topology.input_size()
                );
                Ok(ComputeContext {
                    device,
                    queue: CommandQueue::new(),
                })
            }
        }
    }

    /// Construct a context on the default (CPU) device.
    pub fn new(topology: &Topology, args: &Args) -> Result<Self> {
        Self::with_device(Device::Cpu, topology, args)
    }

    /// The device this context is bound to.
    pub fn device(&self) -> Device {
        self.device
    }

    /// The command queue serialising kernel dispatch.
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Mutable access to the command queue, for logging a dispatch.
    pub fn queue_mut(&mut self) -> &mut CommandQueue {
        &mut self.queue
    }
}

/// Estimate the total byte footprint of the buffers a [`Region`] built from
/// this topology/args would allocate (proximal + distal synapse/segment/cell
/// buffers), logged at `ComputeContext` construction so a caller can see the
/// footprint before committing to it (SPEC_FULL.md §B.2).
///
/// [`Region`]: crate::region::Region
fn estimate_footprint(topology: &Topology, args: &Args) -> usize {
    let columns = topology.columns();
    let proximal_synapses = columns * args.column_proximal_synapse_count;
    let cells = columns * args.column_cell_count;
    let segments = cells * args.cell_segment_count;
    let distal_synapses = segments * args.segment_synapse_count;

    // Rough per-element sizes; good enough for an operator-facing estimate.
    const COLUMN_BYTES: usize = 40;
    const PROXIMAL_SYNAPSE_BYTES: usize = 16;
    const CELL_BYTES: usize = 8;
    const SEGMENT_BYTES: usize = 24;
    const DISTAL_SYNAPSE_BYTES: usize = 24;

    columns * COLUMN_BYTES
        + proximal_synapses * PROXIMAL_SYNAPSE_BYTES
        + cells * CELL_BYTES
        + segments * SEGMENT_BYTES
        + distal_synapses * DISTAL_SYNAPSE_BYTES
}

/// A paired host-shadow / device-memory buffer of fixed length.
///
/// On the CPU backend there is no separate device memory: `upload`/`download`
/// copy into/out of the same host-resident `Vec<T>`. The `blocking` flag is
/// preserved so a real accelerator backend can honour spec.md §5's
/// suspension-point rule; it is advisory-only here.
#[derive(Clone, Debug)]
pub struct DeviceBuffer<T> {
    host: Vec<T>,
}

impl<T: Clone> DeviceBuffer<T> {
    /// Allocate a buffer of `len` elements, each initialised to `fill`.
    pub fn new(len: usize, fill: T) -> Self {
        DeviceBuffer {
            host: vec![fill; len],
        }
    }

    /// Number of elements in the buffer.
    pub fn len(&self) -> usize {
        self.host.len()
    }

    /// Whether the buffer holds zero elements.
    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    /// Copy `data` into the buffer. `blocking` is advisory-only on the CPU
    /// backend (the copy always completes before this call returns); a real
    /// device backend would only guarantee completion-before-return when
    /// `blocking` is `true`.
    pub fn upload(&mut self, queue: &mut CommandQueue, data: &[T], blocking: bool) -> Result<()> {
        if data.len() != self.host.len() {
            return Err(CoreError::InvalidShape {
                expected: self.host.len(),
                actual: data.len(),
            });
        }
        queue.log_dispatch(if blocking { "upload(blocking)" } else { "upload" }, data.len());
        self.host.clone_from_slice(data);
        Ok(())
    }

    /// Read the buffer back. `blocking` is advisory-only on the CPU backend.
    pub fn download(&self, queue: &mut CommandQueue, blocking: bool) -> Vec<T> {
        queue.log_dispatch(
            if blocking { "download(blocking)" } else { "download" },
            self.host.len(),
        );
        self.host.clone()
    }

    /// Borrow the host shadow directly (no simulated transfer / logging).
    pub fn as_slice(&self) -> &[T] {
        &self.host
    }

    /// Mutably borrow the host shadow directly.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.host
    }
}

/// Builds the `constant TYPE NAME = VALUE;` kernel-source preamble described
/// in spec.md §6, by concatenating [`Topology::to_kernel_constants`] and
/// [`Args::to_kernel_constants`]. The shipped CPU kernels read `Topology`/
/// `Args` fields directly rather than parsing this back — it exists for a
/// future backend that compiles real kernel source (SPEC_FULL.md §C.3).
pub mod kernel {
    use crate::args::Args;
    use crate::topology::Topology;

    /// Render the combined topology + args constants header.
    pub fn render_constants(topology: &Topology, args: &Args) -> String {
        format!(
            "{}{}",
            topology.to_kernel_constants(),
            args.to_kernel_constants()
        )
    }
}
