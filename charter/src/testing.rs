//! Signal fixtures shared by unit tests.

use crate::audio::SampleBuffer;

/// 512-sample hops land on whole 1/32 s steps at this rate
pub const CLICK_RATE: u32 = 16384;

/// Silent mono buffer with unit impulses at `clicks` seconds
pub fn click_track(duration: f32, clicks: &[f32]) -> SampleBuffer {
    let len = (duration * CLICK_RATE as f32) as usize;
    let mut samples = vec![0.0f32; len];
    for &t in clicks {
        let idx = (t * CLICK_RATE as f32) as usize;
        if idx < len {
            samples[idx] = 1.0;
        }
    }
    SampleBuffer::new(samples, CLICK_RATE, 1).unwrap()
}

/// Clicks every `60 / bpm` seconds from `start` until `end`
pub fn metronome(duration: f32, bpm: f32, start: f32, end: f32) -> SampleBuffer {
    let beat = 60.0 / bpm;
    let clicks: Vec<f32> = (0..)
        .map(|i| start + i as f32 * beat)
        .take_while(|&t| t < end)
        .collect();
    click_track(duration, &clicks)
}
