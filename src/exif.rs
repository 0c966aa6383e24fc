// SPDX-License-Identifier: GPL-3.0-only

//! GPS EXIF tagging for captured JPEGs
//!
//! Writes GPS latitude/longitude tags into a JPEG file, best-effort: tags
//! are only written when the coordinates are non-zero and the file does not
//! already carry a non-zero GPS position. The tag block is assembled with
//! kamadak-exif and spliced into the JPEG's APP1 segment with img-parts.

use std::path::Path;

use exif::{Field, In, Rational, Tag, Value};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use tracing::{debug, warn};

use crate::errors::PhotoError;
use crate::location::Coordinates;

/// Write GPS tags into the JPEG at `path`
///
/// Returns `Ok(true)` when tags were written, `Ok(false)` when the write
/// was skipped (zero coordinates or tags already present). Blocking; call
/// from a blocking task.
pub fn write_gps_tags(path: &Path, coordinates: Coordinates) -> Result<bool, PhotoError> {
    if coordinates.is_zero() {
        return Ok(false);
    }

    let bytes =
        std::fs::read(path).map_err(|e| PhotoError::MetadataFailed(format!("read: {}", e)))?;

    if has_gps_position(&bytes) {
        debug!(path = %path.display(), "GPS tags already present, skipping");
        return Ok(false);
    }

    let exif_block = build_gps_block(coordinates)?;

    let mut jpeg = Jpeg::from_bytes(Bytes::from(bytes))
        .map_err(|e| PhotoError::MetadataFailed(format!("parse jpeg: {}", e)))?;
    jpeg.set_exif(Some(Bytes::from(exif_block)));

    let mut out = Vec::new();
    jpeg.encoder()
        .write_to(&mut out)
        .map_err(|e| PhotoError::MetadataFailed(format!("encode jpeg: {}", e)))?;
    std::fs::write(path, out).map_err(|e| PhotoError::MetadataFailed(format!("write: {}", e)))?;

    debug!(
        path = %path.display(),
        latitude = coordinates.latitude,
        longitude = coordinates.longitude,
        "GPS tags written"
    );
    Ok(true)
}

/// Read the GPS position stored in a JPEG, if any
pub fn read_gps_position(path: &Path) -> Option<Coordinates> {
    let bytes = std::fs::read(path).ok()?;
    gps_position(&bytes)
}

/// True when the image already carries a non-zero GPS position
fn has_gps_position(bytes: &[u8]) -> bool {
    gps_position(bytes).map(|c| !c.is_zero()).unwrap_or(false)
}

fn gps_position(bytes: &[u8]) -> Option<Coordinates> {
    let exif = exif::Reader::new()
        .read_from_container(&mut std::io::Cursor::new(bytes))
        .ok()?;

    let latitude = dms_value(exif.get_field(Tag::GPSLatitude, In::PRIMARY)?)?;
    let longitude = dms_value(exif.get_field(Tag::GPSLongitude, In::PRIMARY)?)?;

    let lat_sign = ref_sign(exif.get_field(Tag::GPSLatitudeRef, In::PRIMARY), b'S');
    let lon_sign = ref_sign(exif.get_field(Tag::GPSLongitudeRef, In::PRIMARY), b'W');

    Some(Coordinates {
        latitude: latitude * lat_sign,
        longitude: longitude * lon_sign,
    })
}

/// Decimal degrees from a degrees/minutes/seconds rational triple
fn dms_value(field: &Field) -> Option<f64> {
    fn ratio(r: &Rational) -> f64 {
        if r.denom == 0 {
            0.0
        } else {
            r.num as f64 / r.denom as f64
        }
    }

    match &field.value {
        Value::Rational(parts) if !parts.is_empty() => {
            let degrees = parts.first().map(ratio).unwrap_or(0.0);
            let minutes = parts.get(1).map(ratio).unwrap_or(0.0);
            let seconds = parts.get(2).map(ratio).unwrap_or(0.0);
            Some(degrees + minutes / 60.0 + seconds / 3600.0)
        }
        _ => None,
    }
}

/// -1.0 when the hemisphere reference matches `negative`, else 1.0
fn ref_sign(field: Option<&Field>, negative: u8) -> f64 {
    let is_negative = field
        .map(|f| match &f.value {
            Value::Ascii(parts) => parts
                .first()
                .and_then(|s| s.first())
                .map(|b| *b == negative)
                .unwrap_or(false),
            _ => false,
        })
        .unwrap_or(false);
    if is_negative { -1.0 } else { 1.0 }
}

/// Assemble the EXIF block holding the four GPS fields
fn build_gps_block(coordinates: Coordinates) -> Result<Vec<u8>, PhotoError> {
    let lat_ref = if coordinates.latitude >= 0.0 { "N" } else { "S" };
    let lon_ref = if coordinates.longitude >= 0.0 { "E" } else { "W" };

    let fields = [
        Field {
            tag: Tag::GPSLatitudeRef,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![lat_ref.as_bytes().to_vec()]),
        },
        Field {
            tag: Tag::GPSLatitude,
            ifd_num: In::PRIMARY,
            value: Value::Rational(to_dms(coordinates.latitude.abs())),
        },
        Field {
            tag: Tag::GPSLongitudeRef,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![lon_ref.as_bytes().to_vec()]),
        },
        Field {
            tag: Tag::GPSLongitude,
            ifd_num: In::PRIMARY,
            value: Value::Rational(to_dms(coordinates.longitude.abs())),
        },
    ];

    let mut writer = exif::experimental::Writer::new();
    for field in &fields {
        writer.push_field(field);
    }

    let mut cursor = std::io::Cursor::new(Vec::new());
    writer
        .write(&mut cursor, false)
        .map_err(|e| PhotoError::MetadataFailed(format!("assemble exif: {}", e)))?;
    Ok(cursor.into_inner())
}

/// Convert decimal degrees to a degrees/minutes/seconds rational triple
///
/// Seconds carry millisecond precision (denominator 1000).
fn to_dms(value: f64) -> Vec<Rational> {
    let degrees = value.trunc();
    let minutes_full = (value - degrees) * 60.0;
    let minutes = minutes_full.trunc();
    let seconds = (minutes_full - minutes) * 60.0;

    let mut degrees = degrees as u32;
    let mut minutes = minutes as u32;
    let mut seconds_num = (seconds * 1000.0).round() as u32;

    // Rounding can push seconds to exactly 60.000
    if seconds_num >= 60_000 {
        seconds_num -= 60_000;
        minutes += 1;
    }
    if minutes >= 60 {
        minutes -= 60;
        degrees += 1;
    }

    vec![
        Rational {
            num: degrees,
            denom: 1,
        },
        Rational {
            num: minutes,
            denom: 1,
        },
        Rational {
            num: seconds_num,
            denom: 1000,
        },
    ]
}

/// Best-effort wrapper used by the capture pipeline; failures are logged
pub fn geotag_best_effort(path: &Path, coordinates: Coordinates) {
    match write_gps_tags(path, coordinates) {
        Ok(true) => {}
        Ok(false) => debug!(path = %path.display(), "GPS tagging skipped"),
        Err(e) => warn!(path = %path.display(), error = %e, "GPS tagging failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_jpeg(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("IMG_1.jpg");
        image::RgbImage::from_pixel(32, 32, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_to_dms_roundtrip() {
        let ratio = |r: &Rational| r.num as f64 / r.denom as f64;
        for value in [0.0, 51.5007, 179.999, 2.3508] {
            let dms = to_dms(value);
            let back = ratio(&dms[0]) + ratio(&dms[1]) / 60.0 + ratio(&dms[2]) / 3600.0;
            assert!((back - value).abs() < 1e-4, "{} -> {}", value, back);
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample_jpeg(tmp.path());
        let coords = Coordinates {
            latitude: 51.5007,
            longitude: -0.1246,
        };

        assert!(write_gps_tags(&path, coords).unwrap());

        let read = read_gps_position(&path).expect("tags should be readable");
        assert!((read.latitude - coords.latitude).abs() < 1e-4);
        assert!((read.longitude - coords.longitude).abs() < 1e-4);

        // Image must still decode after the splice
        assert!(image::open(&path).is_ok());
    }

    #[test]
    fn test_zero_coordinates_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample_jpeg(tmp.path());
        assert!(!write_gps_tags(&path, Coordinates::ZERO).unwrap());
        assert!(read_gps_position(&path).is_none());
    }

    #[test]
    fn test_existing_tags_not_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let path = sample_jpeg(tmp.path());
        let first = Coordinates {
            latitude: 51.5,
            longitude: -0.12,
        };
        let second = Coordinates {
            latitude: 48.85,
            longitude: 2.35,
        };

        assert!(write_gps_tags(&path, first).unwrap());
        assert!(!write_gps_tags(&path, second).unwrap(), "second write must be skipped");

        let read = read_gps_position(&path).unwrap();
        assert!((read.latitude - first.latitude).abs() < 1e-4);
    }
}
