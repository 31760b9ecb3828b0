//! Integer helpers for centimetre positions and centisecond durations.
//!
//! Positions are `u16` centimetres and durations `u16` centiseconds (1 cs =
//! 10 ms) so that the event log and the persisted record stay compact.

/// Average of two u16 values, rounded half up. Cannot overflow.
#[inline]
pub fn avg2_round_nearest_u16(a: u16, b: u16) -> u16 {
    let s = u32::from(a) + u32::from(b);
    ((s + 1) / 2) as u16
}

/// Median of `values`, sorting them in place. Even counts average the two
/// middle elements. `None` for an empty slice.
pub fn median_u16(values: &mut [u16]) -> Option<u16> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let n = values.len();
    let mid = n / 2;
    if n.is_multiple_of(2) {
        Some(avg2_round_nearest_u16(values[mid - 1], values[mid]))
    } else {
        Some(values[mid])
    }
}

/// Quantize seconds to centiseconds, rounding to nearest and clamping to the
/// `u16` range. Non-finite or negative values map to 0 ("unknown").
#[inline]
pub fn secs_to_cs_u16(secs: f32) -> u16 {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    let scaled = (secs * 100.0).round();
    if scaled >= f32::from(u16::MAX) {
        u16::MAX
    } else {
        scaled as u16
    }
}

#[inline]
pub fn cs_to_secs(cs: u16) -> f32 {
    f32::from(cs) / 100.0
}

/// Milliseconds to the wrapping centisecond tick used by the event log.
#[inline]
pub fn ms_to_tick_cs(ms: u64) -> u16 {
    (ms / 10) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg2_extremes() {
        assert_eq!(avg2_round_nearest_u16(u16::MAX, u16::MAX), u16::MAX);
        assert_eq!(avg2_round_nearest_u16(0, 0), 0);
        assert_eq!(avg2_round_nearest_u16(1, 2), 2);
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median_u16(&mut []), None);
        assert_eq!(median_u16(&mut [7]), Some(7));
        assert_eq!(median_u16(&mut [30, 10, 20]), Some(20));
        assert_eq!(median_u16(&mut [10, 40, 20, 30]), Some(25));
    }

    #[test]
    fn secs_quantization_clamps() {
        assert_eq!(secs_to_cs_u16(15.1), 1510);
        assert_eq!(secs_to_cs_u16(-1.0), 0);
        assert_eq!(secs_to_cs_u16(f32::NAN), 0);
        assert_eq!(secs_to_cs_u16(1.0e9), u16::MAX);
        assert!((cs_to_secs(1510) - 15.1).abs() < 1e-4);
    }

    #[test]
    fn tick_wraps() {
        assert_eq!(ms_to_tick_cs(12_340), 1234);
        assert_eq!(ms_to_tick_cs(655_360), 0);
    }
}
