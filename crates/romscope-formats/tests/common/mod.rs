//! Synthetic fixtures shared by the integration tests

#![allow(dead_code, clippy::unwrap_used)]

use std::io::Write;

/// Didj texture holding `payload` (palette first for paletted formats)
pub fn didj_tex(px_format: u32, width: u32, height: u32, payload: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(payload).unwrap();
    let compressed = encoder.finish().unwrap();

    let fields = [
        3,
        width,
        height,
        width,
        height,
        payload.len() as u32,
        px_format,
        1,
        compressed.len() as u32,
    ];
    let mut file: Vec<u8> = fields.iter().flat_map(|v| v.to_le_bytes()).collect();
    file.extend_from_slice(&compressed);
    file
}

/// 4x4 RGB565 Didj texture filled with red
pub fn red_didj_tex() -> Vec<u8> {
    didj_tex(1, 4, 4, &0xF800u16.to_le_bytes().repeat(16))
}

/// 64 KiB LoROM image with a valid internal header
pub fn lorom_image(title: &[u8; 21]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x10000];
    rom[0x7FC0..0x7FD5].copy_from_slice(title);
    rom[0x7FD5] = 0x20; // LoROM
    rom[0x7FD6] = 0x00; // ROM only
    rom[0x7FD7] = 0x09; // 512 KiB
    rom[0x7FD9] = 0x00; // Japan
    rom[0x7FDA] = 0x01;
    let checksum: u16 = 0xBEEF;
    rom[0x7FDC..0x7FDE].copy_from_slice(&(!checksum).to_le_bytes());
    rom[0x7FDE..0x7FE0].copy_from_slice(&checksum.to_le_bytes());
    rom
}

/// DDS with a single BC1 level made of solid red blocks
pub fn bc1_dds(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0u8; 128];
    data[0..4].copy_from_slice(b"DDS ");
    data[4..8].copy_from_slice(&124u32.to_le_bytes());
    data[12..16].copy_from_slice(&height.to_le_bytes());
    data[16..20].copy_from_slice(&width.to_le_bytes());
    data[28..32].copy_from_slice(&1u32.to_le_bytes());
    data[76..80].copy_from_slice(&32u32.to_le_bytes());
    data[80..84].copy_from_slice(&0x4u32.to_le_bytes());
    data[84..88].copy_from_slice(b"DXT1");

    let blocks = width.div_ceil(4) * height.div_ceil(4);
    for _ in 0..blocks {
        data.extend_from_slice(&[0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0]);
    }
    data
}
