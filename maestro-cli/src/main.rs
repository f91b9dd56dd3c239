//! # Maestro - Live Pitch & Key Detection CLI
//!
//! A headless frontend for the maestro-core engine. Captures audio from the
//! default input device, prints detected notes as they stabilize, records
//! the note sequence for a fixed duration, and reports the detected key.
//!
//! ## Architecture
//! - **Main thread**: 20 Hz polling of the engine's published snapshot
//! - **Audio thread**: CPAL input stream callback
//! - **Worker thread**: drives the engine with captured blocks
//! - **Communication**: crossbeam channel, drop-on-full toward the worker
//!
//! Usage: `maestro-cli [record-seconds] [session-output.json]`

use anyhow::{Context, Result};
use cpal::traits::StreamTrait;
use crossbeam_channel::bounded;
use maestro_core::{audio, detector::DetectorConfig, engine::Engine};
use std::thread;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let record_seconds: u64 = match args.next() {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("invalid duration: {arg}"))?,
        None => 10,
    };
    let session_path = args.next().unwrap_or_else(|| "session.json".to_string());

    // Capture blocks flow from the audio callback to the engine worker.
    let (block_tx, block_rx) = bounded::<Vec<f32>>(64);
    let (stream, sample_rate) = audio::start_audio_capture(block_tx)?;

    let mut engine = Engine::new(DetectorConfig::strongest_bin());
    engine.prepare(sample_rate as f32, 512);
    let handle = engine.handle();

    let worker = thread::spawn(move || {
        while let Ok(block) = block_rx.recv() {
            engine.submit_block(&block);
        }
    });

    eprintln!("[MAIN] Recording for {record_seconds}s, play something...");
    handle.start_recording();

    // Poll the published snapshot at 20 Hz until the recording window ends.
    let deadline = Instant::now() + Duration::from_secs(record_seconds);
    let mut last_printed = String::new();
    while Instant::now() < deadline {
        let notes = handle.detected_notes();
        if let Some(strongest) = notes.first() {
            if strongest.name != last_printed {
                last_printed = strongest.name.clone();
                println!(
                    "[LIVE] {:<3} {:8.2} Hz  (magnitude {:.3})",
                    strongest.name, strongest.frequency, strongest.magnitude
                );
            }
        } else if handle.is_active() {
            last_printed.clear();
        }
        thread::sleep(Duration::from_millis(50));
    }

    let notes = handle.stop_recording();
    println!("[MAIN] Recorded notes: {}", notes.join(" "));
    println!("[MAIN] Detected key: {}", handle.detected_key());

    // Pausing and dropping the stream closes the capture side of the
    // channel, which lets the worker drain and exit.
    let _ = stream.pause();
    drop(stream);
    let _ = worker.join();

    let session = handle.session();
    let json = serde_json::to_string_pretty(&session)?;
    std::fs::write(&session_path, json)
        .with_context(|| format!("failed to write {session_path}"))?;
    eprintln!("[MAIN] Session saved to {session_path}");

    Ok(())
}
