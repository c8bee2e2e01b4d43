//! Wrap-safe tick arithmetic shared by every timer in the kernel.
//!
//! Ticks are `u32` milliseconds that wrap; a start stamp is compared with
//! `now` through a signed difference, so windows up to `i32::MAX` ms work
//! across the wrap and a stamp ahead of `now` never reads as elapsed.

/// Signed milliseconds from `start` to `now`.
#[inline]
pub fn elapsed_ms(now: u32, start: u32) -> i32 {
    now.wrapping_sub(start) as i32
}

/// `now - start >= window_ms`.
#[inline]
pub fn has_elapsed(now: u32, start: u32, window_ms: u32) -> bool {
    let e = elapsed_ms(now, start);
    e >= 0 && e.unsigned_abs() >= window_ms
}

/// `now - start > window_ms`.
#[inline]
pub fn has_exceeded(now: u32, start: u32, window_ms: u32) -> bool {
    let e = elapsed_ms(now, start);
    e >= 0 && e.unsigned_abs() > window_ms
}

/// Water above the empty-kettle weight, never negative.
#[inline]
pub fn water_volume(current_g: f32, empty_g: f32) -> f32 {
    (current_g - empty_g).max(0.0)
}

/// Whole cups contained in `volume_g`.
#[inline]
pub fn cups(volume_g: f32, cup_g: f32) -> u32 {
    if cup_g.is_nan() || cup_g <= 0.0 || !volume_g.is_finite() || volume_g <= 0.0 {
        return 0;
    }
    (volume_g / cup_g).floor() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_survives_wrap() {
        let start = u32::MAX - 49;
        assert_eq!(elapsed_ms(50, start), 100);
        assert!(has_elapsed(50, start, 100));
        assert!(!has_exceeded(50, start, 100));
        assert!(has_exceeded(51, start, 100));
    }

    #[test]
    fn future_stamp_is_not_elapsed() {
        assert_eq!(elapsed_ms(1_000, 1_500), -500);
        assert!(!has_elapsed(1_000, 1_500, 0));
    }

    #[test]
    fn volume_and_cups() {
        assert_eq!(water_volume(300.0, 400.0), 0.0);
        assert_eq!(water_volume(1_150.0, 400.0), 750.0);
        assert_eq!(cups(749.0, 250.0), 2);
        assert_eq!(cups(750.0, 250.0), 3);
        assert_eq!(cups(100.0, 0.0), 0);
    }
}
