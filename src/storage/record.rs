//! # Persisted Configuration Record
//!
//! Fixed little-endian layout stored at the start of the configuration
//! sector.
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | Magic `0x5AD00DAD` |
//! | 4 | 4 | Version |
//! | 8 | 4 | Record size |
//! | 12 | 1 | Calibration present |
//! | 13 | 14 | Calibration minimum |
//! | 27 | 14 | Calibration maximum |
//! | 41 | 1 | Settings present |
//! | 42 | 20 | Control settings |
//!
//! A raw sample is encoded as accelerator, brake, clutch (`u16` each) followed
//! by left and right tiller (`i32` each). Control settings are five `f32`s in
//! declaration order. Absent fields are written as zeros.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::controls::types::{CalibrationBounds, ControlSettings, RawSample};

/// Identifies a configuration record.
pub const RECORD_MAGIC: u32 = 0x5AD0_0DAD;

/// Current layout version.
pub const RECORD_VERSION: u32 = 1;

const HEADER_SIZE: usize = 12;
const RAW_SAMPLE_SIZE: usize = 3 * 2 + 2 * 4;
const SETTINGS_SIZE: usize = 5 * 4;

/// Encoded size of a record.
pub const RECORD_SIZE: usize = HEADER_SIZE + 1 + 2 * RAW_SAMPLE_SIZE + 1 + SETTINGS_SIZE;

/// Contents of the configuration record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PersistedConfig {
    pub calibration: Option<CalibrationBounds>,
    pub settings: Option<ControlSettings>,
}

/// Why a stored image was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("bad magic 0x{0:08X}")]
    Magic(u32),

    #[error("unsupported version {0}")]
    Version(u32),

    #[error("size {0} does not match {}", RECORD_SIZE)]
    Size(u32),
}

/// Result of decoding a stored image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoded {
    Valid(PersistedConfig),
    Invalid(InvalidReason),
}

impl PersistedConfig {
    /// Serializes the record, header included.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(RECORD_SIZE);

        buf.put_u32_le(RECORD_MAGIC);
        buf.put_u32_le(RECORD_VERSION);
        buf.put_u32_le(RECORD_SIZE as u32);

        match &self.calibration {
            Some(bounds) => {
                buf.put_u8(1);
                put_sample(&mut buf, &bounds.min);
                put_sample(&mut buf, &bounds.max);
            }
            None => buf.put_bytes(0, 1 + 2 * RAW_SAMPLE_SIZE),
        }

        match &self.settings {
            Some(settings) => {
                buf.put_u8(1);
                buf.put_f32_le(settings.pedal_deadzone);
                buf.put_f32_le(settings.tiller_deadzone);
                buf.put_f32_le(settings.tiller_max_turn_threshold);
                buf.put_f32_le(settings.tiller_handbrake_threshold_begin);
                buf.put_f32_le(settings.tiller_handbrake_threshold_end);
            }
            None => buf.put_bytes(0, 1 + SETTINGS_SIZE),
        }

        buf.freeze()
    }

    /// Parses a stored image.
    ///
    /// Only the first [`RECORD_SIZE`] bytes are examined. The header must match
    /// exactly; the body is not otherwise checked.
    #[must_use]
    pub fn decode(image: &[u8]) -> Decoded {
        if image.len() < HEADER_SIZE {
            return Decoded::Invalid(InvalidReason::Size(image.len() as u32));
        }

        let mut buf = image;
        let magic = buf.get_u32_le();
        if magic != RECORD_MAGIC {
            return Decoded::Invalid(InvalidReason::Magic(magic));
        }
        let version = buf.get_u32_le();
        if version != RECORD_VERSION {
            return Decoded::Invalid(InvalidReason::Version(version));
        }
        let size = buf.get_u32_le();
        if size as usize != RECORD_SIZE || image.len() < RECORD_SIZE {
            return Decoded::Invalid(InvalidReason::Size(size));
        }

        let calibration_present = buf.get_u8() != 0;
        let min = get_sample(&mut buf);
        let max = get_sample(&mut buf);

        let settings_present = buf.get_u8() != 0;
        let settings = ControlSettings {
            pedal_deadzone: buf.get_f32_le(),
            tiller_deadzone: buf.get_f32_le(),
            tiller_max_turn_threshold: buf.get_f32_le(),
            tiller_handbrake_threshold_begin: buf.get_f32_le(),
            tiller_handbrake_threshold_end: buf.get_f32_le(),
        };

        Decoded::Valid(Self {
            calibration: calibration_present.then_some(CalibrationBounds { min, max }),
            settings: settings_present.then_some(settings),
        })
    }
}

fn put_sample(buf: &mut BytesMut, sample: &RawSample) {
    buf.put_u16_le(sample.accelerator);
    buf.put_u16_le(sample.brake);
    buf.put_u16_le(sample.clutch);
    buf.put_i32_le(sample.left_tiller);
    buf.put_i32_le(sample.right_tiller);
}

fn get_sample(buf: &mut &[u8]) -> RawSample {
    RawSample {
        accelerator: buf.get_u16_le(),
        brake: buf.get_u16_le(),
        clutch: buf.get_u16_le(),
        left_tiller: buf.get_i32_le(),
        right_tiller: buf.get_i32_le(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrated() -> PersistedConfig {
        PersistedConfig {
            calibration: Some(CalibrationBounds {
                min: RawSample {
                    accelerator: 120,
                    brake: 80,
                    clutch: 95,
                    left_tiller: -40_000,
                    right_tiller: -38_500,
                },
                max: RawSample {
                    accelerator: 3980,
                    brake: 4010,
                    clutch: 3999,
                    left_tiller: 612_000,
                    right_tiller: 598_250,
                },
            }),
            settings: None,
        }
    }

    #[test]
    fn test_record_size() {
        assert_eq!(RECORD_SIZE, 62);
        assert_eq!(PersistedConfig::default().encode().len(), RECORD_SIZE);
    }

    #[test]
    fn test_header_layout() {
        let image = PersistedConfig::default().encode();
        assert_eq!(&image[0..4], &[0xAD, 0x0D, 0xD0, 0x5A]);
        assert_eq!(&image[4..8], &[1, 0, 0, 0]);
        assert_eq!(&image[8..12], &[62, 0, 0, 0]);
    }

    #[test]
    fn test_default_body_is_zeroed() {
        let image = PersistedConfig::default().encode();
        assert!(image[HEADER_SIZE..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_field_offsets() {
        let mut config = calibrated();
        config.settings = Some(ControlSettings::default());
        let image = config.encode();

        assert_eq!(image[12], 1);
        assert_eq!(&image[13..15], &120u16.to_le_bytes());
        assert_eq!(&image[19..23], &(-40_000i32).to_le_bytes());
        assert_eq!(&image[27..29], &3980u16.to_le_bytes());
        assert_eq!(image[41], 1);
        assert_eq!(&image[42..46], &0.07f32.to_le_bytes());
        assert_eq!(&image[58..62], &0.9f32.to_le_bytes());
    }

    #[test]
    fn test_decode_encoded_record() {
        let mut config = calibrated();
        config.settings = Some(ControlSettings {
            pedal_deadzone: 0.1,
            ..ControlSettings::default()
        });

        assert_eq!(PersistedConfig::decode(&config.encode()), Decoded::Valid(config));
    }

    #[test]
    fn test_decode_ignores_trailing_sector_bytes() {
        let mut sector = vec![0xFF; 4096];
        sector[..RECORD_SIZE].copy_from_slice(&calibrated().encode());

        assert_eq!(PersistedConfig::decode(&sector), Decoded::Valid(calibrated()));
    }

    #[test]
    fn test_decode_rejects_erased_sector() {
        let sector = vec![0xFF; 256];
        assert_eq!(
            PersistedConfig::decode(&sector),
            Decoded::Invalid(InvalidReason::Magic(0xFFFF_FFFF))
        );
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let mut image = calibrated().encode().to_vec();
        image[4] = 2;
        assert_eq!(
            PersistedConfig::decode(&image),
            Decoded::Invalid(InvalidReason::Version(2))
        );
    }

    #[test]
    fn test_decode_rejects_wrong_size() {
        let mut image = calibrated().encode().to_vec();
        image[8] = 61;
        assert_eq!(
            PersistedConfig::decode(&image),
            Decoded::Invalid(InvalidReason::Size(61))
        );
    }

    #[test]
    fn test_decode_rejects_truncated_image() {
        let image = calibrated().encode();
        assert_eq!(
            PersistedConfig::decode(&image[..8]),
            Decoded::Invalid(InvalidReason::Size(8))
        );
        assert_eq!(
            PersistedConfig::decode(&image[..40]),
            Decoded::Invalid(InvalidReason::Size(62))
        );
    }

    #[test]
    fn test_invalid_reason_messages() {
        assert_eq!(InvalidReason::Magic(0xDEADBEEF).to_string(), "bad magic 0xDEADBEEF");
        assert_eq!(InvalidReason::Version(7).to_string(), "unsupported version 7");
    }
}
