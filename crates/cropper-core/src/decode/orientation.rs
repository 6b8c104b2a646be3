//! EXIF orientation lookup for source images.

use std::io::{BufRead, Seek};

use exif::{In, Reader, Tag};

use super::Orientation;

/// Read the EXIF orientation from an image container.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined. A missing tag is not an error: most PNGs and many
/// JPEGs carry none.
pub fn read_orientation<R: BufRead + Seek>(reader: &mut R) -> Orientation {
    let exif_reader = Reader::new();

    match exif_reader.read_from_container(reader) {
        Ok(exif) => {
            if let Some(field) = exif.get_field(Tag::Orientation, In::PRIMARY) {
                if let Some(value) = field.value.get_uint(0) {
                    return Orientation::from(value);
                }
            }
            Orientation::Normal
        }
        Err(_) => Orientation::Normal,
    }
}

/// Read the EXIF orientation from in-memory image bytes.
pub fn orientation_from_bytes(bytes: &[u8]) -> Orientation {
    read_orientation(&mut std::io::Cursor::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_invalid_data() {
        assert_eq!(orientation_from_bytes(&[0x00, 0x01, 0x02]), Orientation::Normal);
    }

    #[test]
    fn test_orientation_empty() {
        assert_eq!(orientation_from_bytes(&[]), Orientation::Normal);
    }

    #[test]
    fn test_orientation_jpeg_without_exif() {
        let jpeg = crate::encode::encode_jpeg(&[200u8; 4 * 4 * 3], 4, 4, 90).unwrap();
        assert_eq!(orientation_from_bytes(&jpeg), Orientation::Normal);
    }

    #[test]
    fn test_orientation_round_trips_through_embed() {
        let jpeg = crate::encode::encode_jpeg(&[200u8; 4 * 4 * 3], 4, 4, 90).unwrap();
        for orientation in [
            Orientation::Rotate90CW,
            Orientation::Rotate180,
            Orientation::Rotate270CW,
            Orientation::Transverse,
        ] {
            let tagged = crate::encode::embed_orientation(&jpeg, orientation).unwrap();
            assert_eq!(orientation_from_bytes(&tagged), orientation);
        }
    }
}
