//! Render demo: a short pattern compiled and rendered offline to a WAV file.
//!
//! Run with: cargo run -p dough-engine --example render_demo [out.wav]
//!
//! Set `RUST_LOG=dough=debug` to watch pool hits, evictions and orbit setup.

use dough_engine::{EngineConfig, Event, OfflineRenderer, ScheduledEvent};
use tracing_subscriber::EnvFilter;

const CPS: f64 = 0.5;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "render_demo.wav".to_string());
    let config = EngineConfig::from_toml_str("max_polyphony = 24\nrelease_tail = 0.1")?;
    let mut renderer = OfflineRenderer::new(config)?;

    // one cycle lasts 1 / CPS seconds; eighth notes
    let step = 1.0 / CPS / 8.0;
    let bass = ["c2", "c2", "eb2", "c2", "g1", "c2", "bb1", "c2"];
    let mut events = Vec::new();
    for bar in 0..4 {
        for (i, note) in bass.iter().enumerate() {
            let n = bar * bass.len() + i;
            let time = n as f64 * step;
            let cycle = time * CPS;
            let bass = Event::new()
                .with("s", "sawtooth")
                .with("note", *note)
                .with("cutoff", 400.0 + 200.0 * bar as f64)
                .with("lpenv", 2.5)
                .with("lpdecay", 0.12)
                .with("resonance", 6.0)
                .with("gain", 0.7)
                .with("release", 0.05);
            events.push(ScheduledEvent::new(bass, time, step * 0.8).with_cycle(CPS, cycle));

            if i % 2 == 1 {
                let hat = Event::new()
                    .with("s", "white")
                    .with("hcutoff", 7000.0)
                    .with("decay", 0.04)
                    .with("sustain", 0.0)
                    .with("gain", 0.35)
                    .with("pan", if i % 4 == 1 { 0.3 } else { 0.7 })
                    .with("orbit", 2);
                events.push(ScheduledEvent::new(hat, time, 0.05).with_cycle(CPS, cycle));
            }
        }

        let pad = Event::from_json(
            r#"{"s": "supersaw", "note": "c4", "gain": 0.3, "pan": 0.5, "attack": 0.3, "release": 0.6,
                "room": 0.5, "roomsize": 4, "delay": 0.3, "delaytime": 0.375,
                "lfo": {"params": {"control": "pan", "sync": 1, "depth": 0.4}}}"#,
        )?;
        let time = bar as f64 / CPS;
        events.push(ScheduledEvent::new(pad, time, 1.5).with_cycle(CPS, time * CPS));
    }

    let out = renderer.render(events, 4.0 / CPS + 1.0);
    for (index, error) in &out.errors {
        tracing::warn!(index, %error, "event failed");
    }
    for warning in renderer.context_mut().take_warnings() {
        tracing::warn!(%warning, "engine warning");
    }
    tracing::info!(
        voices = out.voices,
        frames = out.frames(),
        peak = out.peak(),
        pool = ?renderer.context().pool_stats(),
        "rendered"
    );

    let spec = hound::WavSpec {
        channels: out.channels.len() as u16,
        sample_rate: out.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;
    for sample in out.interleaved() {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    println!("wrote {path}");
    Ok(())
}
