mod common;

use romscope_core::{BitmapRef, MemorySource, PropertyValue};
use romscope_formats::{ParseOptions, BUILTIN_REGISTRY};
use romscope_texture::Rgba;

#[test]
fn snes_properties_in_insertion_order() {
    let source = MemorySource::new(common::lorom_image(b"ORDERED TITLE        "));
    let parsed = BUILTIN_REGISTRY
        .parse(&source, &ParseOptions::default(), Some("smc"))
        .unwrap();

    let names: Vec<_> = parsed.properties.names().collect();
    assert_eq!(names.first(), Some(&"title"));
    assert_eq!(names.last(), Some(&"copier_header"));
    assert_eq!(parsed.properties.get("region").unwrap().as_str(), Some("Japan"));
    assert_eq!(parsed.properties.get("rom_mapping").unwrap().as_str(), Some("LoROM"));
    assert_eq!(parsed.properties.get("cartridge_hardware").unwrap().as_str(), Some("ROM"));
}

#[test]
fn didj_bitmap_reference_resolves() {
    let source = MemorySource::new(common::red_didj_tex());
    let parsed = BUILTIN_REGISTRY
        .parse(&source, &ParseOptions::default(), None)
        .unwrap();

    let bitmap = match parsed.properties.get("image") {
        Some(PropertyValue::Bitmap(r)) => *r,
        other => panic!("expected a bitmap property, got {:?}", other),
    };
    assert_eq!(bitmap, BitmapRef(0));

    let texture = parsed.texture(bitmap).unwrap();
    assert_eq!((texture.width(), texture.height()), (4, 4));
    assert_eq!((texture.display_width, texture.display_height), (4, 4));
}

#[test]
fn dds_partial_blocks_decode_at_stored_size() {
    let source = MemorySource::new(common::bc1_dds(6, 5));
    let parsed = BUILTIN_REGISTRY
        .parse(&source, &ParseOptions::default(), Some("dds"))
        .unwrap();

    let texture = &parsed.textures[0];
    assert_eq!((texture.width(), texture.height()), (6, 5));
    assert!(texture.bitmap.pixels().iter().all(|p| *p == Rgba::new(255, 0, 0, 255)));
    assert_eq!(parsed.properties.get("texture_format").unwrap().as_str(), Some("BC1 (DXT1)"));
}

#[test]
fn json_view_lists_properties_and_textures() {
    let source = MemorySource::new(common::red_didj_tex());
    let parsed = BUILTIN_REGISTRY
        .parse(&source, &ParseOptions::default(), Some("tex"))
        .unwrap();

    let json = parsed.to_json();
    assert_eq!(json["format"], "didj-tex");
    assert_eq!(json["properties"]["width"], 4);
    assert_eq!(json["textures"][0]["width"], 4);
}
