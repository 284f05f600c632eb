//! Amps to DAC code conversion.

/// Code for 0 A.
pub const DAC_ZERO: u16 = 0x8000;
/// DAC codes per Ampere.
pub const CODES_PER_AMP: u16 = 0x199A;

/// 16-bit DAC input word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DacCode(pub u16);

impl DacCode {
    pub const ZERO_AMPS: Self = Self(DAC_ZERO);

    /// Current this code represents, in Amps.
    pub fn amps(self) -> f32 {
        ((f64::from(self.0) - f64::from(DAC_ZERO)) / f64::from(CODES_PER_AMP)) as f32
    }
}

impl From<DacCode> for u16 {
    fn from(c: DacCode) -> Self {
        c.0
    }
}

/// `clamp(round(amps * 0x199A) + 0x8000, 0, 0xFFFF)`. NaN maps to 0 A.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize(amps: f32) -> DacCode {
    if amps.is_nan() {
        return DacCode::ZERO_AMPS;
    }
    let code = (f64::from(amps) * f64::from(CODES_PER_AMP)).round() + f64::from(DAC_ZERO);
    DacCode(code.clamp(0.0, f64::from(u16::MAX)) as u16)
}
