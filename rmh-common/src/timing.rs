//! Indicator animation timing
//!
//! A momentary indicator fades in, plays its wave animation, lingers for the
//! configured hold time, then fades out:
//!
//! ```text
//! |-- fade in --|------ wave ------|--- hold ---|-- fade out --|
//!     200 ms         1750 ms          0..60 s       200 ms
//! ```

use std::time::Duration;

/// Fade-in and fade-out animation length
pub const FADE_DURATION: Duration = Duration::from_millis(200);

/// Wave animation length
pub const WAVE_DURATION: Duration = Duration::from_millis(1750);

/// Time from showing a momentary indicator until it starts fading
pub fn expiry_delay(hold: Duration) -> Duration {
    FADE_DURATION + WAVE_DURATION + hold
}

/// Total visible lifetime of a momentary indicator, fade-out included
pub fn total_lifetime(hold: Duration) -> Duration {
    expiry_delay(hold) + FADE_DURATION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_delay_with_default_hold() {
        assert_eq!(
            expiry_delay(Duration::from_secs(10)),
            Duration::from_millis(11_950)
        );
        assert_eq!(
            total_lifetime(Duration::from_secs(10)),
            Duration::from_millis(12_150)
        );
    }

    #[test]
    fn test_zero_hold_still_animates() {
        assert_eq!(expiry_delay(Duration::ZERO), Duration::from_millis(1950));
    }
}
