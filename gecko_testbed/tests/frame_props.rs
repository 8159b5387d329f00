//! Property tests of sensor frame decoding.

use gecko_common::prelude::*;
use gecko_testbed::sensor::frame::{RawSample, decode_frame, encode_frame, parse_frame};
use proptest::prelude::*;

fn sample() -> impl Strategy<Value = RawSample> {
    (any::<u16>(), any::<u16>(), any::<u16>()).prop_map(|(fx, fy, fz)| RawSample { fx, fy, fz })
}

fn profile() -> impl Strategy<Value = CalibrationProfile> {
    (1.0f64..50.0, 1.0f64..50.0, 1.0f64..50.0)
        .prop_map(|(fx, fy, fz)| CalibrationProfile::with_factors(fx, fy, fz))
}

proptest! {
    #[test]
    fn parse_inverts_encode(raw in sample(), unused in any::<u16>()) {
        let mut frame = encode_frame(raw);
        // The word after Fz carries nothing.
        frame[7..9].copy_from_slice(&unused.to_be_bytes());
        prop_assert_eq!(parse_frame(&frame), Ok(raw));
    }

    #[test]
    fn decode_is_deterministic(raw in sample(), calibration in profile()) {
        let frame = encode_frame(raw);
        prop_assert_eq!(
            decode_frame(&frame, &calibration),
            decode_frame(&frame, &calibration)
        );
    }

    #[test]
    fn shear_matches_components(raw in sample(), calibration in profile()) {
        let reading = decode_frame(&encode_frame(raw), &calibration).unwrap();
        let expected = reading.fx.hypot(reading.fy);
        prop_assert!((reading.shear - expected).abs() <= 0.0051);
    }

    #[test]
    fn wrong_length_rejected(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
        prop_assume!(bytes.len() != FRAME_LEN);
        prop_assert_eq!(parse_frame(&bytes), Err(FrameError::WrongLength(bytes.len())));
    }

    #[test]
    fn wrong_sync_rejected(raw in sample(), sync in any::<u8>()) {
        prop_assume!(sync != FRAME_START);
        let mut frame = encode_frame(raw);
        frame[0] = sync;
        prop_assert_eq!(parse_frame(&frame), Err(FrameError::BadSync(sync)));
    }

    #[test]
    fn wrong_terminator_rejected(raw in sample(), tail in any::<[u8; 2]>()) {
        prop_assume!(tail != FRAME_TERMINATOR);
        let mut frame = encode_frame(raw);
        frame[FRAME_LEN - 2..].copy_from_slice(&tail);
        prop_assert!(decode_frame(&frame, &CalibrationProfile::default()).is_err());
    }
}
