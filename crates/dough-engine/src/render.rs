//! Offline rendering of a scheduled event list.
//!
//! Events are sorted by trigger time and each one is compiled just before
//! the block that contains its trigger, so triggers always reach the
//! compiler in ascending order and never arrive late.

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::error::{ConfigError, SynthError};
use crate::event::Event;

/// One event with its scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    /// Controls.
    pub event: Event,
    /// Trigger time in seconds.
    pub time: f64,
    /// Gate length in seconds.
    pub duration: f64,
    /// Cycles per second.
    pub cps: f64,
    /// Pattern position of the trigger.
    pub cycle: f64,
}

impl ScheduledEvent {
    /// Event at `time` for `duration` seconds at 0.5 cps, cycle 0.
    pub fn new(event: Event, time: f64, duration: f64) -> Self {
        Self {
            event,
            time,
            duration,
            cps: 0.5,
            cycle: 0.0,
        }
    }

    /// Set the tempo and pattern position.
    pub fn with_cycle(mut self, cps: f64, cycle: f64) -> Self {
        self.cps = cps;
        self.cycle = cycle;
        self
    }
}

/// Result of an offline render.
#[derive(Debug, Clone, Default)]
pub struct RenderOutput {
    /// One buffer per output channel.
    pub channels: Vec<Vec<f32>>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Voices that were compiled.
    pub voices: usize,
    /// Events that failed to compile, by index into the sorted list.
    pub errors: Vec<(usize, SynthError)>,
}

impl RenderOutput {
    /// Frames per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Largest absolute sample over every channel.
    pub fn peak(&self) -> f32 {
        self.channels
            .iter()
            .flatten()
            .fold(0.0_f32, |peak, &s| peak.max(s.abs()))
    }

    /// Frames interleaved by channel.
    pub fn interleaved(&self) -> Vec<f32> {
        let frames = self.frames();
        let mut out = Vec::with_capacity(frames * self.channels.len());
        for i in 0..frames {
            for channel in &self.channels {
                out.push(channel.get(i).copied().unwrap_or(0.0));
            }
        }
        out
    }
}

/// Drives an [`EngineContext`] block by block.
///
/// ```rust
/// use dough_engine::{EngineConfig, Event, OfflineRenderer, ScheduledEvent};
///
/// let mut renderer = OfflineRenderer::new(EngineConfig::default()).unwrap();
/// let events = vec![ScheduledEvent::new(Event::new().with("s", "sine").with("note", 69), 0.0, 0.2)];
/// let out = renderer.render(events, 0.5);
/// assert_eq!(out.voices, 1);
/// assert!(out.peak() > 0.0);
/// ```
pub struct OfflineRenderer {
    context: EngineContext,
}

impl OfflineRenderer {
    /// Renderer over a fresh engine.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            context: EngineContext::new(config)?,
        })
    }

    /// Renderer over an existing engine.
    pub fn with_context(context: EngineContext) -> Self {
        Self { context }
    }

    /// The engine.
    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// The engine, for registering sources or changing settings.
    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.context
    }

    /// Give the engine back.
    pub fn into_context(self) -> EngineContext {
        self.context
    }

    /// Render `seconds` of audio from the current clock position.
    ///
    /// Event times are absolute engine times. An event scheduled before the
    /// current clock is handed to the compiler anyway and dropped as late.
    pub fn render(&mut self, mut events: Vec<ScheduledEvent>, seconds: f64) -> RenderOutput {
        events.sort_by(|a, b| a.time.total_cmp(&b.time));

        let sample_rate = self.context.config().sample_rate;
        let block_size = self.context.config().block_size;
        let channels = self.context.config().output_channels;
        let frames = (seconds.max(0.0) * f64::from(sample_rate)).round() as usize;
        let block_seconds = block_size as f64 / f64::from(sample_rate);

        let mut out = RenderOutput {
            channels: vec![Vec::with_capacity(frames); channels],
            sample_rate,
            voices: 0,
            errors: Vec::new(),
        };

        let mut next = 0;
        let mut rendered = 0;
        while rendered < frames {
            let block_end = self.context.current_time() + block_seconds;
            while next < events.len() && events[next].time < block_end {
                let scheduled = &events[next];
                match self.context.synthesize(
                    &scheduled.event,
                    scheduled.time,
                    scheduled.duration,
                    scheduled.cps,
                    scheduled.cycle,
                ) {
                    Ok(Some(_)) => out.voices += 1,
                    Ok(None) => {}
                    Err(error) => {
                        tracing::warn!(target: "dough::compiler", index = next, %error, "event dropped");
                        out.errors.push((next, error));
                    }
                }
                next += 1;
            }

            self.context.render_block();
            let take = block_size.min(frames - rendered);
            for (dst, src) in out.channels.iter_mut().zip(self.context.output()) {
                dst.extend_from_slice(&src[..take.min(src.len())]);
            }
            rendered += take;
        }

        tracing::debug!(
            target: "dough::compiler",
            frames,
            voices = out.voices,
            errors = out.errors.len(),
            "offline render finished"
        );
        out
    }
}
