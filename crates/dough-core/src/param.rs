//! Parameter automation and smoothing.
//!
//! [`AudioParam`] is a sample-accurate automation timeline: an intrinsic
//! value plus a time-ordered list of [`ParamEvent`]s (set, linear ramp,
//! exponential ramp, exponential approach). The graph evaluates it once per
//! sample while rendering a block, so anything scheduled against the audio
//! clock lands on the exact frame it names.
//!
//! [`SmoothedParam`] is the one-pole smoother used inside processors whose
//! settings change between blocks (delay time, makeup gain) and must not
//! click.
//!
//! ## Usage
//!
//! ```rust
//! use dough_core::AudioParam;
//!
//! let mut gain = AudioParam::new(1.0);
//! gain.set_value_at_time(0.0, 1.0);
//! gain.linear_ramp_to_value_at_time(1.0, 1.5);
//!
//! assert_eq!(gain.value_at(0.5), 1.0); // before the first event: intrinsic value
//! assert!((gain.value_at(1.25) - 0.5).abs() < 1e-6);
//! assert_eq!(gain.value_at(2.0), 1.0);
//! ```

use libm::{expf, powf};

/// One scheduled change on an [`AudioParam`] timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamEvent {
    /// Jump to `value` at `time`.
    SetValue {
        /// Absolute time in seconds.
        time: f64,
        /// Value from `time` on.
        value: f32,
    },
    /// Ramp linearly from the previous event to `value`, arriving at `time`.
    LinearRamp {
        /// Arrival time in seconds.
        time: f64,
        /// Value reached at `time`.
        value: f32,
    },
    /// Ramp exponentially from the previous event to `value`, arriving at `time`.
    ///
    /// Falls back to a linear ramp when either endpoint is zero or the
    /// endpoints differ in sign.
    ExponentialRamp {
        /// Arrival time in seconds.
        time: f64,
        /// Value reached at `time`.
        value: f32,
    },
    /// Approach `target` exponentially from `time` with the given time constant.
    SetTarget {
        /// Start time in seconds.
        time: f64,
        /// Asymptotic target value.
        target: f32,
        /// Time constant in seconds (63% of the way after one constant).
        time_constant: f64,
    },
}

impl ParamEvent {
    /// The time this event is anchored at.
    #[inline]
    pub fn time(&self) -> f64 {
        match *self {
            Self::SetValue { time, .. }
            | Self::LinearRamp { time, .. }
            | Self::ExponentialRamp { time, .. }
            | Self::SetTarget { time, .. } => time,
        }
    }

    fn is_ramp(&self) -> bool {
        matches!(self, Self::LinearRamp { .. } | Self::ExponentialRamp { .. })
    }
}

/// Shape of the segments written by [`apply_adsr`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RampCurve {
    /// Straight-line segments.
    #[default]
    Linear,
    /// Exponential segments (perceptually even for frequencies).
    Exponential,
}

/// Attack / decay / sustain / release in seconds (sustain is a 0..1 level).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrShape {
    /// Attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Sustain level, 0..1 of the distance from `min` to `max`.
    pub sustain: f32,
    /// Release time in seconds.
    pub release: f64,
}

impl Default for AdsrShape {
    fn default() -> Self {
        Self {
            attack: 0.001,
            decay: 0.05,
            sustain: 1.0,
            release: 0.01,
        }
    }
}

/// A parameter with an intrinsic value and a sample-accurate automation timeline.
///
/// Values returned by [`value_at`](Self::value_at) and
/// [`fill`](Self::fill) are clamped to the parameter's nominal range.
#[derive(Debug, Clone)]
pub struct AudioParam {
    value: f32,
    default: f32,
    min: f32,
    max: f32,
    events: Vec<ParamEvent>,
}

impl AudioParam {
    /// Create an unbounded parameter with the given default value.
    pub fn new(default: f32) -> Self {
        Self::with_range(default, f32::MIN, f32::MAX)
    }

    /// Create a parameter with a nominal `[min, max]` range.
    pub fn with_range(default: f32, min: f32, max: f32) -> Self {
        Self {
            value: default,
            default,
            min,
            max,
            events: Vec::new(),
        }
    }

    /// Intrinsic value used when no automation event applies.
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Set the intrinsic value.
    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(self.min, self.max);
    }

    /// Default value the parameter was created with.
    #[inline]
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Nominal `(min, max)` range.
    #[inline]
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// Scheduled events in time order.
    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    /// True if any automation event is scheduled.
    pub fn has_automation(&self) -> bool {
        !self.events.is_empty()
    }

    /// Jump to `value` at `time`.
    pub fn set_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::SetValue { time, value });
    }

    /// Ramp linearly to `value`, arriving at `time`.
    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::LinearRamp { time, value });
    }

    /// Ramp exponentially to `value`, arriving at `time`.
    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) {
        self.insert(ParamEvent::ExponentialRamp { time, value });
    }

    /// Approach `target` from `time` with the given time constant.
    pub fn set_target_at_time(&mut self, target: f32, time: f64, time_constant: f64) {
        self.insert(ParamEvent::SetTarget {
            time,
            target,
            time_constant,
        });
    }

    /// Remove every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time() < time);
    }

    /// Freeze the curve at `time`: cancel later events and hold the value there.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) {
        let held = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.set_value_at_time(held, time);
    }

    /// Drop all automation and restore the default value.
    pub fn reset(&mut self) {
        self.events.clear();
        self.value = self.default;
    }

    /// Value of the parameter at absolute time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        self.raw_value_at(t).clamp(self.min, self.max)
    }

    /// Fill `out` with per-sample values starting at `start`, `dt` seconds apart.
    pub fn fill(&self, start: f64, dt: f64, out: &mut [f32]) {
        if self.events.is_empty() {
            out.fill(self.value.clamp(self.min, self.max));
            return;
        }
        for (k, slot) in out.iter_mut().enumerate() {
            *slot = self.value_at(start + k as f64 * dt);
        }
    }

    /// Collapse events that are fully in the past relative to `now`.
    ///
    /// The curve from `now` on is unchanged. Long-lived params (orbit gains)
    /// call this once per block so their timelines stay short.
    pub fn prune(&mut self, now: f64) {
        let elapsed = self.events.partition_point(|e| e.time() <= now);
        if elapsed < 2 {
            return;
        }
        let anchor = elapsed - 1;
        let anchor_time = self.events[anchor].time();
        if anchor == 1
            && matches!(self.events[0], ParamEvent::SetValue { time, .. } if time == anchor_time)
        {
            return;
        }
        let before = self.value_before(anchor);
        self.events.drain(..anchor);
        self.events.insert(
            0,
            ParamEvent::SetValue {
                time: anchor_time,
                value: before,
            },
        );
    }

    fn insert(&mut self, event: ParamEvent) {
        let time = event.time();
        let idx = self.events.partition_point(|e| e.time() <= time);
        self.events.insert(idx, event);
    }

    fn raw_value_at(&self, t: f64) -> f32 {
        let next = self.events.partition_point(|e| e.time() <= t);
        if let Some(event) = self.events.get(next)
            && event.is_ramp()
        {
            let (t0, v0) = self.segment_start(next);
            return interpolate(event, t0, v0, t);
        }
        if next == 0 {
            return self.value;
        }
        self.settled_value(next - 1, t)
    }

    /// Value produced by event `i` at `t >= time(i)` when nothing later interferes.
    fn settled_value(&self, i: usize, t: f64) -> f32 {
        match self.events[i] {
            ParamEvent::SetValue { value, .. }
            | ParamEvent::LinearRamp { value, .. }
            | ParamEvent::ExponentialRamp { value, .. } => value,
            ParamEvent::SetTarget {
                time,
                target,
                time_constant,
            } => {
                let start = self.value_before(i);
                if time_constant <= 0.0 {
                    target
                } else {
                    let k = expf(-((t - time) / time_constant) as f32);
                    target + (start - target) * k
                }
            }
        }
    }

    /// Value just before event `i` takes effect.
    fn value_before(&self, i: usize) -> f32 {
        if i == 0 {
            self.value
        } else {
            self.settled_value(i - 1, self.events[i].time())
        }
    }

    fn segment_start(&self, i: usize) -> (f64, f32) {
        if i == 0 {
            (0.0, self.value)
        } else {
            let t0 = self.events[i - 1].time();
            (t0, self.settled_value(i - 1, t0))
        }
    }
}

fn interpolate(event: &ParamEvent, t0: f64, v0: f32, t: f64) -> f32 {
    let (t1, v1, exponential) = match *event {
        ParamEvent::LinearRamp { time, value } => (time, value, false),
        ParamEvent::ExponentialRamp { time, value } => (time, value, true),
        _ => return v0,
    };
    if t1 <= t0 {
        return v1;
    }
    let progress = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0) as f32;
    if exponential && v0 * v1 > 0.0 {
        v0 * powf(v1 / v0, progress)
    } else {
        v0 + (v1 - v0) * progress
    }
}

/// Schedule an ADSR-shaped sweep between `min` and `max` on `param`.
///
/// The gate opens at `begin` and closes at `end`. A gate that closes during
/// the attack or the decay releases from wherever the curve got to.
/// Returns the time the release lands on `min`.
pub fn apply_adsr(
    param: &mut AudioParam,
    shape: &AdsrShape,
    min: f32,
    max: f32,
    begin: f64,
    end: f64,
    curve: RampCurve,
) -> f64 {
    let attack = shape.attack.max(0.0);
    let decay = shape.decay.max(0.0);
    let release = shape.release.max(0.0);
    let sustain_level = min + shape.sustain.clamp(0.0, 1.0) * (max - min);
    let held = (end - begin).max(0.0);

    let mut ramp = |p: &mut AudioParam, value: f32, time: f64| match curve {
        RampCurve::Linear => p.linear_ramp_to_value_at_time(value, time),
        RampCurve::Exponential => p.exponential_ramp_to_value_at_time(value, time),
    };

    param.set_value_at_time(min, begin);
    if attack > held {
        let progress = if attack > 0.0 { (held / attack) as f32 } else { 1.0 };
        ramp(param, min + (max - min) * progress, end);
    } else if attack + decay > held {
        ramp(param, max, begin + attack);
        let progress = if decay > 0.0 {
            ((held - attack) / decay) as f32
        } else {
            1.0
        };
        ramp(param, max + (sustain_level - max) * progress, end);
    } else {
        ramp(param, max, begin + attack);
        ramp(param, sustain_level, begin + attack + decay);
        param.set_value_at_time(sustain_level, end);
    }
    ramp(param, min, end + release);
    end + release
}

/// One-pole smoothed value for zipper-free changes inside processors.
///
/// ```rust
/// use dough_core::SmoothedParam;
///
/// let mut time = SmoothedParam::with_config(0.25, 48000.0, 20.0);
/// time.set_target(0.5);
/// for _ in 0..48000 {
///     time.advance();
/// }
/// assert!(time.is_settled());
/// ```
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    current: f32,
    target: f32,
    coeff: f32,
    sample_rate: f32,
    smoothing_time_ms: f32,
}

impl SmoothedParam {
    /// Create an unsmoothed parameter (changes apply instantly).
    pub fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: 1.0,
            sample_rate: 48000.0,
            smoothing_time_ms: 0.0,
        }
    }

    /// Create a parameter smoothed over `smoothing_time_ms`.
    pub fn with_config(initial: f32, sample_rate: f32, smoothing_time_ms: f32) -> Self {
        let mut param = Self::new(initial);
        param.sample_rate = sample_rate;
        param.smoothing_time_ms = smoothing_time_ms;
        param.recalculate_coeff();
        param
    }

    /// Set the value to smooth towards.
    #[inline]
    pub fn set_target(&mut self, target: f32) {
        self.target = target;
    }

    /// Jump to `value` without smoothing.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.target = value;
        self.current = value;
    }

    /// Update the sample rate and recompute the coefficient.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.recalculate_coeff();
    }

    /// Advance one sample and return the smoothed value.
    #[inline]
    pub fn advance(&mut self) -> f32 {
        self.current += self.coeff * (self.target - self.current);
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target value.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// True once the value is within 1e-6 of the target.
    #[inline]
    pub fn is_settled(&self) -> bool {
        (self.current - self.target).abs() < 1e-6
    }

    /// Jump to the target.
    #[inline]
    pub fn snap_to_target(&mut self) {
        self.current = self.target;
    }

    // coeff = 1 - exp(-1 / (tau * fs)); tau is the 63% time.
    fn recalculate_coeff(&mut self) {
        if self.smoothing_time_ms <= 0.0 || self.sample_rate <= 0.0 {
            self.coeff = 1.0;
        } else {
            let samples = self.smoothing_time_ms / 1000.0 * self.sample_rate;
            self.coeff = 1.0 - expf(-1.0 / samples);
        }
    }
}

impl Default for SmoothedParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsic_value_without_events() {
        let p = AudioParam::new(0.3);
        assert_eq!(p.value_at(10.0), 0.3);
    }

    #[test]
    fn test_set_value_steps() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 1.0);
        p.set_value_at_time(2.0, 2.0);
        assert_eq!(p.value_at(0.999), 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
        assert_eq!(p.value_at(1.5), 1.0);
        assert_eq!(p.value_at(2.5), 2.0);
    }

    #[test]
    fn test_linear_ramp_midpoint() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.linear_ramp_to_value_at_time(10.0, 1.0);
        assert!((p.value_at(0.5) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_exponential_ramp_geometric_midpoint() {
        let mut p = AudioParam::new(100.0);
        p.set_value_at_time(100.0, 0.0);
        p.exponential_ramp_to_value_at_time(400.0, 2.0);
        assert!((p.value_at(1.0) - 200.0).abs() < 0.01);
    }

    #[test]
    fn test_exponential_ramp_from_zero_falls_back_to_linear() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.exponential_ramp_to_value_at_time(1.0, 1.0);
        assert!((p.value_at(0.5) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_set_target_approach() {
        let mut p = AudioParam::new(1.0);
        p.set_target_at_time(0.0, 1.0, 0.1);
        assert_eq!(p.value_at(1.0), 1.0);
        let after_one_tau = p.value_at(1.1);
        assert!((after_one_tau - (-1.0f32).exp()).abs() < 1e-3);
    }

    #[test]
    fn test_cancel_and_hold_freezes_mid_ramp() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0);
        p.linear_ramp_to_value_at_time(1.0, 1.0);
        p.cancel_and_hold_at_time(0.25);
        assert!((p.value_at(0.25) - 0.25).abs() < 1e-4);
        assert!((p.value_at(0.9) - 0.25).abs() < 1e-4);
    }

    #[test]
    fn test_cancel_scheduled_values_reverts_to_intrinsic() {
        let mut p = AudioParam::new(0.7);
        p.set_value_at_time(0.1, 1.0);
        p.cancel_scheduled_values(0.0);
        assert!(!p.has_automation());
        assert_eq!(p.value_at(2.0), 0.7);
    }

    #[test]
    fn test_prune_keeps_future_curve() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 0.0);
        p.linear_ramp_to_value_at_time(0.0, 1.0);
        p.set_target_at_time(1.0, 2.0, 0.5);
        p.linear_ramp_to_value_at_time(0.5, 4.0);
        let probe = [2.5, 3.0, 3.5, 4.5];
        let before: Vec<f32> = probe.iter().map(|&t| p.value_at(t)).collect();
        p.prune(2.2);
        assert!(p.events().len() <= 3);
        for (t, v) in probe.iter().zip(before) {
            assert!((p.value_at(*t) - v).abs() < 1e-5, "t={t}");
        }
    }

    #[test]
    fn test_range_clamps_output() {
        let mut p = AudioParam::with_range(0.5, 0.0, 1.0);
        p.set_value_at_time(4.0, 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
    }

    #[test]
    fn test_adsr_full_shape() {
        let mut p = AudioParam::new(0.0);
        let shape = AdsrShape {
            attack: 0.1,
            decay: 0.1,
            sustain: 0.5,
            release: 0.2,
        };
        let done = apply_adsr(&mut p, &shape, 0.0, 1.0, 1.0, 2.0, RampCurve::Linear);
        assert!((done - 2.2).abs() < 1e-9);
        assert!((p.value_at(1.05) - 0.5).abs() < 1e-3);
        assert!((p.value_at(1.1) - 1.0).abs() < 1e-3);
        assert!((p.value_at(1.5) - 0.5).abs() < 1e-3);
        assert!((p.value_at(2.1) - 0.25).abs() < 1e-3);
        assert!(p.value_at(2.3).abs() < 1e-6);
    }

    #[test]
    fn test_adsr_gate_closes_during_attack() {
        let mut p = AudioParam::new(0.0);
        let shape = AdsrShape {
            attack: 1.0,
            decay: 0.1,
            sustain: 1.0,
            release: 0.5,
        };
        apply_adsr(&mut p, &shape, 0.0, 1.0, 0.0, 0.5, RampCurve::Linear);
        assert!((p.value_at(0.5) - 0.5).abs() < 1e-3);
        assert!(p.value_at(1.0).abs() < 1e-6);
    }

    #[test]
    fn test_smoothed_param_converges() {
        let mut p = SmoothedParam::with_config(0.0, 48000.0, 5.0);
        p.set_target(1.0);
        for _ in 0..4800 {
            p.advance();
        }
        assert!((p.get() - 1.0).abs() < 1e-3);
    }
}
