//! Feedback echo with a fractional delay line
//!
//! The delayed signal is fed back into the line scaled by `feedback` and
//! mixed with the dry input: dry at full level, wet at half level.

use super::Effect;

/// Longest delay the line can hold
pub const MAX_DELAY_SECS: f32 = 1.0;

/// Dry signal level
pub const DRY_LEVEL: f32 = 1.0;

/// Wet (delayed) signal level
pub const WET_LEVEL: f32 = 0.5;

/// Highest feedback the line accepts
pub const MAX_FEEDBACK: f32 = 0.9;

/// Stereo feedback echo
pub struct Echo {
    sample_rate: f32,
    /// Delay buffer (stereo interleaved: L,R,L,R,...)
    buffer: Vec<f32>,
    /// Buffer length in stereo frames
    buffer_frames: usize,
    /// Write position in frames
    write_pos: usize,
    /// Delay in fractional frames
    delay_frames: f32,
    feedback: f32,
}

impl Echo {
    /// Create an echo with the given delay (seconds) and feedback
    pub fn new(sample_rate: u32, delay_time: f32, feedback: f32) -> Self {
        let sr = sample_rate.max(1) as f32;
        // Two guard frames so the interpolation never reads the write head
        let buffer_frames = (sr * MAX_DELAY_SECS) as usize + 2;

        let mut echo = Self {
            sample_rate: sr,
            buffer: vec![0.0; buffer_frames * 2],
            buffer_frames,
            write_pos: 0,
            delay_frames: 1.0,
            feedback: 0.0,
        };
        echo.set_delay_time(delay_time);
        echo.set_feedback(feedback);
        echo
    }

    /// Set delay time in seconds; applies from the next sample
    pub fn set_delay_time(&mut self, secs: f32) {
        let max_frames = (self.buffer_frames - 2) as f32;
        self.delay_frames = (secs * self.sample_rate).clamp(1.0, max_frames);
    }

    /// Delay time in seconds
    pub fn delay_time(&self) -> f32 {
        self.delay_frames / self.sample_rate
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = feedback.clamp(0.0, MAX_FEEDBACK);
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    #[inline]
    fn read(&self, channel: usize) -> f32 {
        let mut read_pos = self.write_pos as f32 - self.delay_frames;
        if read_pos < 0.0 {
            read_pos += self.buffer_frames as f32;
        }
        let index0 = read_pos as usize % self.buffer_frames;
        let index1 = (index0 + 1) % self.buffer_frames;
        let frac = read_pos - read_pos.floor();

        let a = self.buffer[index0 * 2 + channel];
        let b = self.buffer[index1 * 2 + channel];
        a + (b - a) * frac
    }
}

impl Effect for Echo {
    fn process(&mut self, samples: &mut [f32]) {
        for frame in samples.chunks_exact_mut(2) {
            let delayed_l = self.read(0);
            let delayed_r = self.read(1);

            let write = self.write_pos * 2;
            self.buffer[write] = frame[0] + delayed_l * self.feedback;
            self.buffer[write + 1] = frame[1] + delayed_r * self.feedback;

            frame[0] = frame[0] * DRY_LEVEL + delayed_l * WET_LEVEL;
            frame[1] = frame[1] * DRY_LEVEL + delayed_r * WET_LEVEL;

            self.write_pos = (self.write_pos + 1) % self.buffer_frames;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    fn name(&self) -> &'static str {
        "Echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(frames: usize) -> Vec<f32> {
        let mut samples = vec![0.0; frames * 2];
        samples[0] = 1.0;
        samples[1] = 1.0;
        samples
    }

    #[test]
    fn test_impulse_repeats_at_delay() {
        // 1kHz sample rate, 10ms delay -> 10 frames
        let mut echo = Echo::new(1000, 0.01, 0.5);
        let mut samples = impulse(40);
        echo.process(&mut samples);

        assert!((samples[0] - 1.0).abs() < 1e-6, "dry passes at full level");
        assert!((samples[10 * 2] - 0.5).abs() < 1e-6, "first repeat at wet level");
        assert!((samples[20 * 2] - 0.25).abs() < 1e-6, "second repeat scaled by feedback");
        assert!(samples[5 * 2].abs() < 1e-6);
    }

    #[test]
    fn test_zero_feedback_single_repeat() {
        let mut echo = Echo::new(1000, 0.01, 0.0);
        let mut samples = impulse(40);
        echo.process(&mut samples);
        assert!((samples[20] - 0.5).abs() < 1e-6);
        assert!(samples[40].abs() < 1e-6);
    }

    #[test]
    fn test_live_delay_change() {
        let mut echo = Echo::new(1000, 0.01, 0.0);
        echo.set_delay_time(0.02);
        assert!((echo.delay_time() - 0.02).abs() < 1e-6);
        let mut samples = impulse(40);
        echo.process(&mut samples);
        assert!(samples[20].abs() < 1e-6);
        assert!((samples[40] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_parameters_clamped() {
        let mut echo = Echo::new(48000, 5.0, 2.0);
        assert!(echo.delay_time() <= MAX_DELAY_SECS + 1e-3);
        assert!((echo.feedback() - MAX_FEEDBACK).abs() < 1e-6);
        echo.set_feedback(-1.0);
        assert_eq!(echo.feedback(), 0.0);
    }

    #[test]
    fn test_output_stays_finite_with_max_feedback() {
        let mut echo = Echo::new(48000, 0.05, MAX_FEEDBACK);
        let mut samples: Vec<f32> = (0..48000).map(|i| ((i as f32) * 0.01).sin()).collect();
        echo.process(&mut samples);
        assert!(samples.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_reset_clears_tail() {
        let mut echo = Echo::new(1000, 0.01, 0.5);
        let mut samples = impulse(5);
        echo.process(&mut samples);
        echo.reset();
        let mut silence = vec![0.0; 80];
        echo.process(&mut silence);
        assert!(silence.iter().all(|&s| s == 0.0));
    }
}
