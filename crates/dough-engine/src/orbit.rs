//! Orbit output buses.
//!
//! An orbit is the long-lived mix bus a group of voices shares: a summing
//! stage for dry signal, one delay and one reverb fed by per-voice sends, an
//! output gain carrying duck automation, and a DJ filter in front of the
//! hardware route.
//!
//! ```text
//! voice tails ──► input ──┐
//! delay sends ──► delay ──┼──► output (duck) ──► djf ──► hardware
//! room sends  ──► reverb ─┘
//! ```

use dough_core::{Graph, GraphError, NodeId};
use dough_effects::{DelayNode, DjFilterNode, GainNode, ReverbNode, ReverbSettings};

/// Shared effects and routing for one orbit.
#[derive(Debug, Clone, PartialEq)]
pub struct Orbit {
    number: u32,
    channels: Vec<usize>,
    input: NodeId,
    delay: NodeId,
    reverb: NodeId,
    output: NodeId,
    djf: NodeId,
    delay_settings: Option<(f32, f32)>,
}

impl Orbit {
    /// Build the orbit's nodes and route it to hardware `channels` (0-based).
    pub fn new(graph: &mut Graph, number: u32, channels: &[usize]) -> Result<Self, GraphError> {
        let sample_rate = graph.sample_rate();
        let input = graph.add(GainNode::new());
        let delay = graph.add(DelayNode::new(sample_rate));
        let reverb = graph.add(ReverbNode::new(sample_rate));
        let output = graph.add(GainNode::new());
        let djf = graph.add(DjFilterNode::new());
        for from in [input, delay, reverb] {
            graph.connect(from, output)?;
        }
        graph.connect(output, djf)?;
        graph.connect_output(djf, channels)?;
        tracing::debug!(target: "dough::orbit", orbit = number, ?channels, "orbit created");
        Ok(Self {
            number,
            channels: channels.to_vec(),
            input,
            delay,
            reverb,
            output,
            djf,
            delay_settings: None,
        })
    }

    /// Orbit number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Hardware channels (0-based).
    pub fn channels(&self) -> &[usize] {
        &self.channels
    }

    /// Summing stage voice tails connect to.
    pub fn input(&self) -> NodeId {
        self.input
    }

    /// Shared delay; delay sends connect here.
    pub fn delay(&self) -> NodeId {
        self.delay
    }

    /// Shared reverb; room sends connect here.
    pub fn reverb(&self) -> NodeId {
        self.reverb
    }

    /// Output gain carrying the duck automation.
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// DJ filter feeding the hardware.
    pub fn djf(&self) -> NodeId {
        self.djf
    }

    /// Every node the orbit owns.
    pub fn nodes(&self) -> [NodeId; 5] {
        [self.input, self.delay, self.reverb, self.output, self.djf]
    }

    /// Set delay time and feedback from `time` on. Returns `false` when unchanged.
    pub fn configure_delay(
        &mut self,
        graph: &mut Graph,
        delay_time: f32,
        feedback: f32,
        time: f64,
    ) -> Result<bool, GraphError> {
        if self.delay_settings == Some((delay_time, feedback)) {
            return Ok(false);
        }
        graph
            .param_mut(self.delay, "time")?
            .set_value_at_time(delay_time, time);
        graph
            .param_mut(self.delay, "feedback")?
            .set_value_at_time(feedback, time);
        self.delay_settings = Some((delay_time, feedback));
        tracing::debug!(target: "dough::orbit", orbit = self.number, delay_time, feedback, "delay configured");
        Ok(true)
    }

    /// Regenerate the reverb impulse if `settings` differ. Returns `true` when it did.
    pub fn configure_reverb(&mut self, graph: &mut Graph, settings: ReverbSettings) -> Result<bool, GraphError> {
        let reverb = graph
            .node_mut::<ReverbNode>(self.reverb)
            .ok_or(GraphError::NodeNotFound(self.reverb))?;
        let regenerated = reverb.configure(settings);
        if regenerated {
            tracing::debug!(target: "dough::orbit", orbit = self.number, ?settings, "reverb regenerated");
        }
        Ok(regenerated)
    }

    /// Dip the output by `depth` over `onset` seconds from `time`, recovering over `attack`.
    ///
    /// Automation in flight at `time` is cancelled and held, so overlapping
    /// ducks restart from wherever the gain is.
    pub fn duck(
        &mut self,
        graph: &mut Graph,
        time: f64,
        onset: f64,
        attack: f64,
        depth: f32,
    ) -> Result<(), GraphError> {
        let gain = graph.param_mut(self.output, "gain")?;
        gain.cancel_and_hold_at_time(time);
        gain.linear_ramp_to_value_at_time(1.0 - depth.clamp(0.0, 1.0), time + onset);
        gain.exponential_ramp_to_value_at_time(1.0, time + onset + attack);
        Ok(())
    }

    /// Move the DJ filter to `value` (0..1, 0.5 is open) at `time`.
    pub fn set_djf(&mut self, graph: &mut Graph, value: f32, time: f64) -> Result<(), GraphError> {
        graph
            .param_mut(self.djf, "value")?
            .set_value_at_time(value.clamp(0.0, 1.0), time);
        Ok(())
    }

    /// Remove every node from the graph.
    pub fn teardown(self, graph: &mut Graph) {
        for node in self.nodes() {
            // already gone is fine
            let _ = graph.remove(node);
        }
        tracing::debug!(target: "dough::orbit", orbit = self.number, "orbit torn down");
    }
}
