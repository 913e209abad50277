//! Channel expansion and single-pixel conversion to RGBA
//!
//! Narrow channels are scaled by bit replication so that the maximum input
//! value maps to 255 and zero maps to zero.

use romscope_core::Endian;

use crate::bitmap::Rgba;
use crate::format::DirectFormat;

/// Expand a 4-bit channel to 8 bits
#[inline]
pub const fn expand4(v: u16) -> u8 {
    ((v & 0x0F) as u8) * 17
}

/// Expand a 5-bit channel to 8 bits
#[inline]
pub const fn expand5(v: u16) -> u8 {
    let v = (v & 0x1F) as u8;
    (v << 3) | (v >> 2)
}

/// Expand a 6-bit channel to 8 bits
#[inline]
pub const fn expand6(v: u16) -> u8 {
    let v = (v & 0x3F) as u8;
    (v << 2) | (v >> 4)
}

#[inline]
const fn expand1(v: u16) -> u8 {
    if v & 1 != 0 {
        0xFF
    } else {
        0
    }
}

#[inline]
fn read_u16(bytes: &[u8], order: Endian) -> u16 {
    let pair = [bytes[0], bytes[1]];
    match order {
        Endian::Little => u16::from_le_bytes(pair),
        Endian::Big => u16::from_be_bytes(pair),
    }
}

/// Convert one 16-bit word
pub fn decode_word(format: DirectFormat, w: u16) -> Rgba {
    match format {
        DirectFormat::Rgb565 => Rgba::new(expand5(w >> 11), expand6(w >> 5), expand5(w), 0xFF),
        DirectFormat::Bgr565 => Rgba::new(expand5(w), expand6(w >> 5), expand5(w >> 11), 0xFF),
        DirectFormat::Argb1555 => {
            Rgba::new(expand5(w >> 10), expand5(w >> 5), expand5(w), expand1(w >> 15))
        }
        DirectFormat::Rgb555 => Rgba::new(expand5(w >> 10), expand5(w >> 5), expand5(w), 0xFF),
        DirectFormat::Rgba4444 => {
            Rgba::new(expand4(w >> 12), expand4(w >> 8), expand4(w >> 4), expand4(w))
        }
        DirectFormat::Argb4444 => {
            Rgba::new(expand4(w >> 8), expand4(w >> 4), expand4(w), expand4(w >> 12))
        }
        // Byte-oriented layouts; the word is taken in memory order, zero padded
        other => {
            let [lo, hi] = w.to_le_bytes();
            decode_pixel(other, &[lo, hi, 0, 0], Endian::Little)
        }
    }
}

/// Convert one pixel stored in `bytes` (exactly `bytes_per_pixel` long)
pub fn decode_pixel(format: DirectFormat, bytes: &[u8], order: Endian) -> Rgba {
    match format {
        DirectFormat::Rgb565
        | DirectFormat::Bgr565
        | DirectFormat::Argb1555
        | DirectFormat::Rgb555
        | DirectFormat::Rgba4444
        | DirectFormat::Argb4444 => decode_word(format, read_u16(bytes, order)),
        DirectFormat::Rgb888 => Rgba::new(bytes[0], bytes[1], bytes[2], 0xFF),
        DirectFormat::Bgr888 => Rgba::new(bytes[2], bytes[1], bytes[0], 0xFF),
        DirectFormat::Rgba8888 => Rgba::new(bytes[0], bytes[1], bytes[2], bytes[3]),
        DirectFormat::Bgra8888 => Rgba::new(bytes[2], bytes[1], bytes[0], bytes[3]),
        DirectFormat::Argb8888 => Rgba::new(bytes[1], bytes[2], bytes[3], bytes[0]),
        DirectFormat::Abgr8888 => Rgba::new(bytes[3], bytes[2], bytes[1], bytes[0]),
        DirectFormat::L8 => Rgba::new(bytes[0], bytes[0], bytes[0], 0xFF),
        DirectFormat::A8 => Rgba::new(0xFF, 0xFF, 0xFF, bytes[0]),
        DirectFormat::La88 => Rgba::new(bytes[0], bytes[0], bytes[0], bytes[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rgb565_primaries() {
        assert_eq!(decode_word(DirectFormat::Rgb565, 0xF800), Rgba::new(255, 0, 0, 255));
        assert_eq!(decode_word(DirectFormat::Rgb565, 0x07E0), Rgba::new(0, 255, 0, 255));
        assert_eq!(decode_word(DirectFormat::Rgb565, 0x001F), Rgba::new(0, 0, 255, 255));
        assert_eq!(decode_word(DirectFormat::Bgr565, 0x001F), Rgba::new(255, 0, 0, 255));
    }

    #[test]
    fn test_alpha_layouts() {
        assert_eq!(decode_word(DirectFormat::Argb1555, 0x8000), Rgba::new(0, 0, 0, 255));
        assert_eq!(decode_word(DirectFormat::Argb1555, 0x7FFF), Rgba::new(255, 255, 255, 0));
        assert_eq!(decode_word(DirectFormat::Rgba4444, 0xF00F), Rgba::new(255, 0, 0, 255));
        assert_eq!(decode_word(DirectFormat::Argb4444, 0x0F00), Rgba::new(255, 0, 0, 0));
    }

    #[test]
    fn test_word_byte_order() {
        let bytes = [0xF8, 0x00];
        assert_eq!(decode_pixel(DirectFormat::Rgb565, &bytes, Endian::Big), Rgba::new(255, 0, 0, 255));
        assert_eq!(decode_pixel(DirectFormat::Rgb565, &bytes, Endian::Little).r, 0);
    }

    #[test]
    fn test_byte_layouts() {
        let px = [1, 2, 3, 4];
        assert_eq!(decode_pixel(DirectFormat::Bgra8888, &px, Endian::Little), Rgba::new(3, 2, 1, 4));
        assert_eq!(decode_pixel(DirectFormat::Argb8888, &px, Endian::Big), Rgba::new(2, 3, 4, 1));
        assert_eq!(decode_pixel(DirectFormat::La88, &px[..2], Endian::Little), Rgba::new(1, 1, 1, 2));
    }

    proptest! {
        #[test]
        fn prop_expansion_is_monotonic_and_full_range(v in 0u16..32) {
            if v > 0 {
                prop_assert!(expand5(v) > expand5(v - 1));
            }
            prop_assert_eq!(expand5(0), 0);
            prop_assert_eq!(expand5(31), 255);
            prop_assert_eq!(expand6(63), 255);
            prop_assert_eq!(expand4(15), 255);
        }
    }
}
