//! AFSK tone generator support.
//!
//! The transmitter signals bits by switching between two audio tones
//! (mark 1200 Hz, space 2200 Hz). The tone itself is synthesized by a
//! fast timer stepping through a 16-entry sine table; the modulator
//! only starts, stops and toggles it through the [`ToneControl`] seam.

/// Mark tone frequency (Hz).
pub const AFSK_MARK: u32 = 1200;

/// Space tone frequency (Hz).
pub const AFSK_SPACE: u32 = 2200;

/// Steps per sine period.
pub const STEPS: usize = 16;

/// Timer resolution: least common multiple of 16 x 1200 and 16 x 2200.
pub const TONE_RESOLUTION: u32 = 211_200;

/// Full-amplitude sine table (offset binary around 125).
pub const SINE: [u8; STEPS] = [
    125, 173, 213, 240, 250, 240, 213, 173, 125, 77, 37, 10, 0, 10, 37, 77,
];

/// 80% amplitude sine table, used for the high tone so both tones
/// sound at roughly equal loudness after the radio's pre-emphasis.
pub const SINE_LOW: [u8; STEPS] = [
    125, 163, 196, 217, 225, 217, 196, 163, 125, 87, 54, 33, 25, 33, 54, 87,
];

/// Control seam the modulator drives.
pub trait ToneControl {
    /// Begin tone output.
    fn start(&mut self);

    /// Silence the output.
    fn stop(&mut self);

    /// Switch between mark and space.
    fn toggle(&mut self);
}

/// Sine table stepper for DAC/sigma-delta based tone output.
///
/// The fast timer calls [`TonePhase::next`] at `STEPS` times the tone
/// frequency and writes the returned level to the converter.
#[derive(Debug, Default)]
pub struct TonePhase {
    step: usize,
    high: bool,
}

impl TonePhase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the high (space) or low (mark) tone.
    pub fn set_high(&mut self, high: bool) {
        self.high = high;
    }

    /// Flip between the two tones.
    pub fn toggle(&mut self) {
        self.high = !self.high;
    }

    pub fn is_high(&self) -> bool {
        self.high
    }

    /// Advance one step and return the converter level.
    pub fn next(&mut self) -> u8 {
        let level = if self.high {
            SINE[self.step]
        } else {
            SINE_LOW[self.step]
        };
        self.step += 1;
        if self.step >= STEPS {
            self.step = 0;
        }
        level
    }

    /// Timer period divider for the given tone frequency.
    pub fn ticks_for(freq: u32) -> u32 {
        TONE_RESOLUTION / (freq * STEPS as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_tables_centered() {
        // Both tables swing symmetrically around the 125 midpoint.
        assert_eq!(SINE[0], 125);
        assert_eq!(SINE[STEPS / 2], 125);
        assert_eq!(SINE_LOW[0], 125);
        assert_eq!(SINE_LOW[STEPS / 2], 125);
    }

    #[test]
    fn test_phase_wraps() {
        let mut phase = TonePhase::new();
        let first: Vec<u8> = (0..STEPS).map(|_| phase.next()).collect();
        let second: Vec<u8> = (0..STEPS).map(|_| phase.next()).collect();
        assert_eq!(first, second);
        assert_eq!(first[0], SINE_LOW[0]);
    }

    #[test]
    fn test_toggle_switches_table() {
        let mut phase = TonePhase::new();
        phase.toggle();
        assert!(phase.is_high());
        assert_eq!(phase.next(), SINE[0]);
        assert_eq!(phase.next(), SINE[1]);
    }

    #[test]
    fn test_tick_dividers() {
        // 211200 / (1200 * 16) = 11, / (2200 * 16) = 6
        assert_eq!(TonePhase::ticks_for(AFSK_MARK), 11);
        assert_eq!(TonePhase::ticks_for(AFSK_SPACE), 6);
    }
}
