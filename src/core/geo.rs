//! Degrees / minutes / minute-fraction coordinates
//!
//! Both device protocols report positions in the NMEA-style `DDMM.ffff`
//! layout; storage keeps that string next to decimal degrees.

/// A coordinate split into whole degrees, whole minutes and a fixed-width
/// decimal fraction of a minute. Sign is not represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DegreesMinutes {
    pub degrees: u32,
    pub minutes: u32,
    /// Fractional minutes scaled by `10^digits`
    pub fraction: u32,
    /// Number of fractional minute digits carried by `fraction`
    pub digits: u32,
}

impl DegreesMinutes {
    pub fn new(degrees: u32, minutes: u32, fraction: u32, digits: u32) -> Self {
        Self {
            degrees,
            minutes,
            fraction,
            digits,
        }
    }

    /// Split decimal degrees, rounding to `digits` fractional minute digits
    ///
    /// The hemisphere is dropped: -33.8688 and 33.8688 split the same way.
    /// Callers keep the sign in the decimal value.
    pub fn from_decimal(value: f32, digits: u32) -> Self {
        let abs = f64::from(value).abs();
        let scale = 10u64.pow(digits);

        let mut degrees = abs.trunc() as u32;
        let scaled = ((abs - abs.trunc()) * 60.0 * scale as f64).round() as u64;
        let mut minutes = (scaled / scale) as u32;
        let fraction = (scaled % scale) as u32;

        // Rounding can carry 59.99999' up to a full degree
        if minutes >= 60 {
            minutes -= 60;
            degrees += 1;
        }

        Self::new(degrees, minutes, fraction, digits)
    }

    /// Decimal degrees: `deg + (min + fraction / 10^digits) / 60`
    pub fn to_decimal(&self) -> f32 {
        let scale = 10f64.powi(self.digits as i32);
        let minutes = f64::from(self.minutes) + f64::from(self.fraction) / scale;
        (f64::from(self.degrees) + minutes / 60.0) as f32
    }

    /// `DDMM.fff…` (two-digit degrees)
    pub fn format_latitude(&self) -> String {
        // Fraction is always `digits` wide: 42 with four digits is .0042
        format!(
            "{:02}{:02}.{:0width$}",
            self.degrees,
            self.minutes,
            self.fraction,
            width = self.digits as usize
        )
    }

    /// `DDDMM.fff…` (three-digit degrees)
    pub fn format_longitude(&self) -> String {
        format!(
            "{:03}{:02}.{:0width$}",
            self.degrees,
            self.minutes,
            self.fraction,
            width = self.digits as usize
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_split_known_value() {
        // 55°45.12'
        let dm = DegreesMinutes::from_decimal(55.752, 2);
        assert_eq!(dm.degrees, 55);
        assert_eq!(dm.minutes, 45);
        assert_eq!(dm.fraction, 12);
        assert_eq!(dm.format_latitude(), "5545.12");
    }

    #[test]
    fn test_round_trip_two_digit_fraction() {
        // Two fractional minute digits resolve 0.01' = 1/6000 degree
        let tolerance = 1.0 / 6000.0;
        for &value in &[0.0f32, 1.5, 12.3456, 37.617_7, 55.755_8, 89.999, 179.999_9] {
            let dm = DegreesMinutes::from_decimal(value, 2);
            assert!(dm.minutes < 60);
            assert_relative_eq!(dm.to_decimal(), value, epsilon = tolerance);
        }
    }

    #[test]
    fn test_leading_zero_fraction() {
        // 30°15.0042' must not read back as 30°15.42'
        let dm = DegreesMinutes::new(30, 15, 42, 4);
        assert_eq!(dm.format_latitude(), "3015.0042");
        assert_relative_eq!(dm.to_decimal(), 30.0 + 15.0042 / 60.0, epsilon = 1e-6);
    }

    #[test]
    fn test_minute_carry() {
        let dm = DegreesMinutes::from_decimal(10.999_999_9, 2);
        assert_eq!((dm.degrees, dm.minutes, dm.fraction), (11, 0, 0));
    }

    #[test]
    fn test_longitude_format_and_sign() {
        let dm = DegreesMinutes::from_decimal(-37.5, 4);
        assert_eq!(dm.format_longitude(), "03730.0000");
    }
}
