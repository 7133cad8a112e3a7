// Terrain-side properties: the height field, underlay blending and tile
// tessellation.

use std::sync::Arc;

use proptest::prelude::*;
use region_scene::definitions::UnderlayDefinition;
use region_scene::math::Trig;
use region_scene::terrain::blend::blend_underlays;
use region_scene::terrain::height::{MAX_HEIGHT, MIN_HEIGHT};
use region_scene::terrain::{tessellate, HeightField, RegionTileGrid, TileCorners};

#[path = "common/mod.rs"]
mod common;

fn field() -> HeightField {
    HeightField::new(Trig::shared())
}

proptest! {
    #[test]
    fn height_is_bounded_and_repeatable(x in -200_000i32..200_000, y in -200_000i32..200_000) {
        let field = field();
        let h = field.height(x, y);
        prop_assert!((MIN_HEIGHT..=MAX_HEIGHT).contains(&h));
        prop_assert_eq!(h, field.height(x, y));
    }
}

#[test]
fn separate_fields_agree() {
    let (a, b) = (field(), HeightField::new(Arc::new(Trig::new())));
    for (x, y) in [(0, 0), (3200, 3200), (12_345, 9_876), (-40, 77)] {
        assert_eq!(a.height(x, y), b.height(x, y));
    }
}

#[test]
fn uniform_underlay_blends_to_its_own_colour() {
    let size = 16;
    let grid = RegionTileGrid::decode(
        &common::ground_terrain(size, 1),
        size,
        3200,
        3200,
        &field(),
        false,
        0,
    )
    .unwrap();
    let def = UnderlayDefinition::decode(0, &common::underlay_def(0x5A8C3E)).unwrap();

    let blended = blend_underlays(&grid, 0, 5, |_| Some(def.hsl));
    for x in 0..size {
        for y in 0..size {
            assert_eq!(blended[x * size + y], def.packed_color(), "tile {x},{y}");
        }
    }
}

#[test]
fn flat_plain_tile_is_two_triangles() {
    let corners = TileCorners {
        heights: [-80; 4],
        underlay: [900; 4],
        overlay: [0; 4],
        texture: -1,
    };
    let model = tessellate(0, 0, 0, 0, &corners);
    assert_eq!(model.triangles.len(), 2);

    let mut xz: Vec<(i32, i32)> = model
        .triangles
        .iter()
        .flatten()
        .map(|v| (v.x, v.z))
        .collect();
    xz.sort();
    xz.dedup();
    assert_eq!(xz, vec![(0, 0), (0, 128), (128, 0), (128, 128)]);
    assert!(model.triangles.iter().flatten().all(|v| v.y == -80));
}
