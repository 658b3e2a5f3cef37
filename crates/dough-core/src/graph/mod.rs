//! Block-based processing graph for voices and orbits.
//!
//! The graph is an arena of boxed [`AudioNode`]s addressed by
//! generation-counted [`NodeId`]s. Three kinds of connection exist:
//!
//! - **Audio edges** (`connect`): the destination's input is the stereo sum
//!   of all its audio sources.
//! - **Parameter edges** (`connect_param`): the source's mono downmix is
//!   added, sample by sample, to the destination parameter's automation
//!   value. This is how LFOs, envelopes and bus signals modulate anything.
//! - **Hardware routes** (`connect_output`): a node's output is summed into
//!   one or two hardware output channels.
//!
//! # Lifecycle
//!
//! Each render pass asks every node for a [`NodeState`]. Sources stay
//! `Pending` until their start time and become `Done` at their stop time.
//! Worklet kinds ([`NodeKind::is_worklet`]) become `Done` once the clock
//! passes their declared end time plus the graph's grace period. `Done`
//! nodes are disconnected and destroyed after the block; their ids go stale.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut graph = Graph::new(48000.0, DEFAULT_BLOCK_SIZE, 2);
//! let osc = graph.add(Oscillator::new(Waveform::Saw));
//! let amp = graph.add(Gain::new());
//! graph.connect(osc, amp)?;
//! graph.connect_output(amp, &[0, 1])?;
//! graph.start(osc, 0.0)?;
//! graph.stop(osc, 1.0)?;
//! graph.param_mut(amp, "gain")?.linear_ramp_to_value_at_time(0.0, 1.0);
//! graph.render_block();
//! ```

pub mod buffer;
pub mod node;
mod processing;

pub use buffer::StereoBlock;
pub use node::{AudioNode, NodeId, NodeKind, NodeState, ParamSpec, ProcessContext};
pub use processing::{DEFAULT_BLOCK_SIZE, Graph, GraphError, OutputRoute};
