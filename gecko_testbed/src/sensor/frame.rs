//! Sensor frame layout and decoding.
//!
//! ```text
//! offset  0     1..3   3..5   5..7   7..9      9..11
//!        ┌────┬──────┬──────┬──────┬─────────┬───────┐
//!        │0xA5│  Fx  │  Fy  │  Fz  │ (unused)│ CR LF │
//!        └────┴──────┴──────┴──────┴─────────┴───────┘
//! ```
//!
//! Channel values are unsigned 16-bit big-endian ADC counts centred on
//! 32768, spanning ±2 V.

use gecko_common::force::ChannelValues;
use gecko_common::prelude::*;

/// One complete frame.
pub type Frame = [u8; FRAME_LEN];

/// Raw ADC counts of the three force channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    /// Fx counts.
    pub fx: u16,
    /// Fy counts.
    pub fy: u16,
    /// Fz counts.
    pub fz: u16,
}

impl RawSample {
    /// Sample at zero volts on every channel.
    pub const MIDPOINT: RawSample = RawSample {
        fx: 32768,
        fy: 32768,
        fz: 32768,
    };

    /// Quantize channel voltages.
    pub fn from_volts(volts: ChannelValues) -> Self {
        Self {
            fx: volts_to_raw(volts.fx),
            fy: volts_to_raw(volts.fy),
            fz: volts_to_raw(volts.fz),
        }
    }

    /// Channel voltages.
    pub fn volts(&self) -> ChannelValues {
        ChannelValues {
            fx: raw_to_volts(self.fx),
            fy: raw_to_volts(self.fy),
            fz: raw_to_volts(self.fz),
        }
    }
}

/// ADC counts to volts.
#[inline]
pub fn raw_to_volts(raw: u16) -> f64 {
    (f64::from(raw) - ADC_MIDPOINT) / ADC_MIDPOINT * ADC_FULL_SCALE_VOLTS
}

/// Volts to the nearest ADC count, saturating at the converter range.
#[inline]
pub fn volts_to_raw(volts: f64) -> u16 {
    let counts = (volts / ADC_FULL_SCALE_VOLTS * ADC_MIDPOINT + ADC_MIDPOINT).round();
    counts.clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Check framing and extract the raw channel counts.
pub fn parse_frame(bytes: &[u8]) -> Result<RawSample, FrameError> {
    if bytes.len() != FRAME_LEN {
        return Err(FrameError::WrongLength(bytes.len()));
    }
    if bytes[0] != FRAME_START {
        return Err(FrameError::BadSync(bytes[0]));
    }
    let tail = [bytes[FRAME_LEN - 2], bytes[FRAME_LEN - 1]];
    if tail != FRAME_TERMINATOR {
        return Err(FrameError::BadTerminator(tail));
    }
    let word = |i: usize| u16::from_be_bytes([bytes[i], bytes[i + 1]]);
    Ok(RawSample {
        fx: word(1),
        fy: word(3),
        fz: word(5),
    })
}

/// Decode a frame into a calibrated reading.
///
/// Each component is `volts * factor - offset` rounded to 0.01 N; shear is
/// derived from the rounded Fx and Fy.
pub fn decode_frame(bytes: &[u8], calibration: &CalibrationProfile) -> Result<ForceReading, FrameError> {
    let sample = parse_frame(bytes)?;
    Ok(calibration.apply(sample.volts()))
}

/// Build a well-formed frame; the unused word is zero.
pub fn encode_frame(sample: RawSample) -> Frame {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = FRAME_START;
    frame[1..3].copy_from_slice(&sample.fx.to_be_bytes());
    frame[3..5].copy_from_slice(&sample.fy.to_be_bytes());
    frame[5..7].copy_from_slice(&sample.fz.to_be_bytes());
    frame[FRAME_LEN - 2..].copy_from_slice(&FRAME_TERMINATOR);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> CalibrationProfile {
        CalibrationProfile::with_factors(1.0, 1.0, 1.0)
    }

    #[test]
    fn test_midpoint_decodes_to_zero() {
        let frame = [0xA5, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x00, 0x00, 0x0D, 0x0A];
        let reading = decode_frame(&frame, &unit()).unwrap();
        assert_eq!(reading, ForceReading::new(0.0, 0.0, 0.0));
        assert_eq!(reading.shear, 0.0);
    }

    #[test]
    fn test_full_scale_fx() {
        let frame = encode_frame(RawSample {
            fx: 0xFFFF,
            ..RawSample::MIDPOINT
        });
        let reading = decode_frame(&frame, &unit()).unwrap();
        assert_eq!(reading.fx, 2.0);
        assert_eq!(reading.shear, 2.0);
    }

    #[test]
    fn test_lowest_count_fx() {
        let frame = encode_frame(RawSample {
            fx: 0x0000,
            ..RawSample::MIDPOINT
        });
        let reading = decode_frame(&frame, &unit()).unwrap();
        assert_eq!(reading.fx, -2.0);
    }

    #[test]
    fn test_offset_applied_after_scaling() {
        let mut profile = CalibrationProfile::with_factors(10.0, 10.0, 10.0);
        profile.offsets.fz = 0.5;
        // 1 V on Fz
        let frame = encode_frame(RawSample {
            fz: 49152,
            ..RawSample::MIDPOINT
        });
        let reading = decode_frame(&frame, &profile).unwrap();
        assert_eq!(reading.fz, 9.5);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let frame = [0xA5, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x00, 0x00, 0x0D];
        assert_eq!(
            decode_frame(&frame, &unit()),
            Err(FrameError::WrongLength(10))
        );
    }

    #[test]
    fn test_bad_terminator_rejected() {
        let mut frame = encode_frame(RawSample::MIDPOINT);
        frame[10] = 0x00;
        assert_eq!(
            decode_frame(&frame, &unit()),
            Err(FrameError::BadTerminator([0x0D, 0x00]))
        );
    }

    #[test]
    fn test_bad_sync_rejected() {
        let mut frame = encode_frame(RawSample::MIDPOINT);
        frame[0] = 0x5A;
        assert_eq!(decode_frame(&frame, &unit()), Err(FrameError::BadSync(0x5A)));
    }

    #[test]
    fn test_volts_to_raw_saturates() {
        assert_eq!(volts_to_raw(5.0), u16::MAX);
        assert_eq!(volts_to_raw(-5.0), 0);
        assert_eq!(volts_to_raw(0.0), 32768);
    }
}
