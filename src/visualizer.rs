//! Audio-reactive visualizer model: radial waveform plus a particle burst layer.
//!
//! Input per frame is the analyser's byte time-domain window (`FFT_SIZE / 2`
//! samples centred on 128). Output is plain geometry; drawing happens in
//! `web::visualizer_view`. Gameplay never reads anything from here.

use std::collections::VecDeque;
use std::f64::consts::{FRAC_PI_2, TAU};

pub const FFT_SIZE: u32 = 256;
pub const SAMPLE_COUNT: usize = (FFT_SIZE / 2) as usize;

pub const BASE_RADIUS: f64 = 80.0;
pub const WAVE_AMPLITUDE: f64 = 50.0;
pub const PARTICLE_RADIUS: f64 = 2.0;
/// Average amplitude per spawned particle.
pub const SPAWN_DIVISOR: f64 = 120.0;
pub const MAX_PARTICLES: usize = 600;
pub const PARTICLE_TTL_FRAMES: u32 = 180;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmplitudeStats {
    pub average: f64,
    pub peak: u8,
}

pub fn amplitude_stats(samples: &[u8]) -> AmplitudeStats {
    if samples.is_empty() {
        return AmplitudeStats { average: 0.0, peak: 0 };
    }
    let sum: u64 = samples.iter().map(|&s| u64::from(s)).sum();
    AmplitudeStats {
        average: sum as f64 / samples.len() as f64,
        peak: samples.iter().copied().max().unwrap_or(0),
    }
}

/// Radius of the waveform ring before per-sample displacement.
pub fn inner_radius(stats: &AmplitudeStats) -> f64 {
    BASE_RADIUS * (1.0 + stats.average / 255.0)
}

/// Closed ring of points, one per sample except the last, starting at 12 o'clock.
pub fn waveform_points(samples: &[u8], center: (f64, f64), inner: f64) -> Vec<(f64, f64)> {
    if samples.len() < 2 {
        return Vec::new();
    }
    let steps = samples.len() - 1;
    let increment = TAU / steps as f64;
    samples[..steps]
        .iter()
        .enumerate()
        .map(|(i, &s)| {
            let angle = -FRAC_PI_2 + increment * i as f64;
            let radius = inner + f64::from(s) / 128.0 * WAVE_AMPLITUDE;
            (center.0 + radius * angle.cos(), center.1 + radius * angle.sin())
        })
        .collect()
}

// --- Particles ---------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub age: u32,
}

impl Particle {
    /// 1.0 when fresh, fading to 0.0 at expiry.
    pub fn alpha(&self) -> f64 {
        1.0 - f64::from(self.age) / f64::from(PARTICLE_TTL_FRAMES)
    }
}

/// xorshift64*; enough for particle angles.
#[derive(Clone, Debug)]
pub struct ParticleRng(u64);

impl ParticleRng {
    pub fn new(seed: u64) -> Self {
        // Zero is a fixed point of xorshift.
        Self(if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed })
    }

    /// Uniform in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        (x.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// Geometry for one drawn frame.
#[derive(Clone, Debug, PartialEq)]
pub struct VisualFrame {
    pub inner_radius: f64,
    pub ring: Vec<(f64, f64)>,
    pub spawned: usize,
}

pub struct Visualizer {
    center: (f64, f64),
    particles: VecDeque<Particle>,
    rng: ParticleRng,
}

impl Visualizer {
    pub fn new(width: f64, height: f64, seed: u64) -> Self {
        Self {
            center: (width / 2.0, height / 2.0),
            particles: VecDeque::with_capacity(MAX_PARTICLES),
            rng: ParticleRng::new(seed),
        }
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn particle_count(&self) -> usize {
        self.particles.len()
    }

    /// Advance one frame with the analyser's current sample window.
    pub fn step(&mut self, samples: &[u8]) -> VisualFrame {
        let stats = amplitude_stats(samples);
        let inner = inner_radius(&stats);
        let ring = waveform_points(samples, self.center, inner);

        // Existing particles drift and age; expired ones drop off the front.
        for p in self.particles.iter_mut() {
            p.x += p.vx;
            p.y += p.vy;
            p.age += 1;
        }
        self.particles.retain(|p| p.age < PARTICLE_TTL_FRAMES);

        let count = (stats.average / SPAWN_DIVISOR).floor() as usize;
        let speed = f64::from(stats.peak) / 128.0;
        for i in 0..count {
            let angle = self.rng.next_f64() * TAU;
            let sample = if samples.is_empty() { 0 } else { samples[i * samples.len() / count] };
            let radius = inner + f64::from(sample) / 128.0 * WAVE_AMPLITUDE;
            self.particles.push_back(Particle {
                x: self.center.0 + radius * angle.cos(),
                y: self.center.1 + radius * angle.sin(),
                vx: angle.cos() * speed,
                vy: angle.sin() * speed,
                age: 0,
            });
        }
        while self.particles.len() > MAX_PARTICLES {
            self.particles.pop_front();
        }

        VisualFrame { inner_radius: inner, ring, spawned: count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_silence() {
        let silence = [128u8; SAMPLE_COUNT];
        let stats = amplitude_stats(&silence);
        assert_eq!(stats.average, 128.0);
        assert_eq!(stats.peak, 128);
        assert_eq!(amplitude_stats(&[]).peak, 0);
    }

    #[test]
    fn louder_audio_widens_the_ring() {
        let quiet = amplitude_stats(&[64u8; 8]);
        let loud = amplitude_stats(&[250u8; 8]);
        assert!(inner_radius(&loud) > inner_radius(&quiet));
    }

    #[test]
    fn ring_has_one_point_per_sample_minus_one() {
        let pts = waveform_points(&[128u8; SAMPLE_COUNT], (0.0, 0.0), 80.0);
        assert_eq!(pts.len(), SAMPLE_COUNT - 1);
        // First point sits straight above the centre.
        assert!(pts[0].0.abs() < 1e-9);
        assert!((pts[0].1 + 130.0).abs() < 1e-9);
    }

    #[test]
    fn particle_population_is_capped() {
        let mut v = Visualizer::new(400.0, 400.0, 42);
        let loud = [255u8; SAMPLE_COUNT];
        for _ in 0..1000 {
            v.step(&loud);
        }
        assert!(v.particle_count() <= MAX_PARTICLES);
    }

    #[test]
    fn particles_expire_after_ttl() {
        let mut v = Visualizer::new(400.0, 400.0, 7);
        v.step(&[255u8; SAMPLE_COUNT]);
        assert!(v.particle_count() > 0);
        for _ in 0..PARTICLE_TTL_FRAMES {
            v.step(&[0u8; SAMPLE_COUNT]);
        }
        assert_eq!(v.particle_count(), 0);
    }

    #[test]
    fn rng_stays_in_unit_interval() {
        let mut rng = ParticleRng::new(0);
        for _ in 0..1000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }
}
