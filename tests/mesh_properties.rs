// Property tests over the mesh codec, the lighter and ground contouring.

use std::sync::Arc;

use proptest::prelude::*;
use region_scene::math::lightness_of;
use region_scene::model::contour::CornerHeights;
use region_scene::model::light::FLAT_SHADED;
use region_scene::model::{contour, decode, encode, light, ContourMode, IntermediateMesh, MeshVersion};

#[path = "common/mod.rs"]
mod common;

#[test]
fn empty_mesh_round_trips_in_every_version() {
    for version in [MeshVersion::V0, MeshVersion::V1, MeshVersion::V2, MeshVersion::V3] {
        let bytes = encode(&IntermediateMesh::default(), version).unwrap();
        let mesh = decode(&bytes).unwrap();
        assert_eq!(mesh.vertex_count(), 0, "{version:?}");
        assert_eq!(mesh.face_count(), 0, "{version:?}");
    }
}

#[test]
fn truncated_mesh_is_rejected() {
    let bytes = common::box_bytes();
    // drop the first body byte but keep the footer intact
    let err = decode(&bytes[1..]).unwrap_err();
    assert!(err.to_string().contains("mesh"), "{err}");
}

fn arbitrary_mesh() -> impl Strategy<Value = IntermediateMesh> {
    (1usize..24).prop_flat_map(|vertices| {
        (
            prop::collection::vec((-2000i32..2000, -2000i32..2000, -2000i32..2000), vertices),
            prop::collection::vec(
                ((0..vertices as u32), (0..vertices as u32), (0..vertices as u32), any::<u16>()),
                1..32,
            ),
        )
            .prop_map(|(positions, faces)| IntermediateMesh {
                vertices_x: Arc::new(positions.iter().map(|p| p.0).collect()),
                vertices_y: Arc::new(positions.iter().map(|p| p.1).collect()),
                vertices_z: Arc::new(positions.iter().map(|p| p.2).collect()),
                faces: Arc::new(faces.iter().map(|f| [f.0, f.1, f.2]).collect()),
                face_colors: Arc::new(faces.iter().map(|f| f.3).collect()),
                ..Default::default()
            })
    })
}

proptest! {
    #[test]
    fn geometry_survives_encoding(
        mesh in arbitrary_mesh(),
        version in prop::sample::select(vec![MeshVersion::V0, MeshVersion::V1, MeshVersion::V2, MeshVersion::V3]),
    ) {
        let decoded = decode(&encode(&mesh, version).unwrap()).unwrap();
        prop_assert_eq!(&decoded.vertices_x, &mesh.vertices_x);
        prop_assert_eq!(&decoded.vertices_y, &mesh.vertices_y);
        prop_assert_eq!(&decoded.vertices_z, &mesh.vertices_z);
        prop_assert_eq!(&decoded.faces, &mesh.faces);
        prop_assert_eq!(&decoded.face_colors, &mesh.face_colors);
    }

    #[test]
    fn lit_lightness_is_clamped(
        ambient in -400i32..400,
        contrast in 1i32..4000,
        lx in -300i32..300,
        ly in -300i32..300,
        lz in -300i32..300,
        flat_faces in prop::collection::vec(any::<bool>(), 12),
    ) {
        let mut mesh = common::box_mesh(96, 160, 0x2A55);
        mesh.face_render_types = Some(Arc::new(flat_faces.iter().map(|&f| f as u8).collect()));
        let lit = light(&mesh, ambient, contrast, lx, ly, lz);
        for colors in lit.face_colors.iter() {
            for &c in colors.iter().filter(|&&c| c != FLAT_SHADED) {
                prop_assert!((2..=126).contains(&lightness_of(c)), "lightness of {c}");
            }
        }
    }
}

#[test]
fn extreme_light_vectors_stay_in_range() {
    let mesh = common::box_mesh(64, 128, 7);
    let vectors = [
        (64, 768, 40_000, 40_000, 0),
        (64, i32::MAX, i32::MAX, i32::MAX, i32::MAX),
        (i32::MIN, 768, i32::MIN, -10, i32::MIN),
        (i32::MAX, -768, 1, 0, 0),
    ];
    for (ambient, contrast, lx, ly, lz) in vectors {
        let lit = light(&mesh, ambient, contrast, lx, ly, lz);
        assert_eq!(lit.face_colors.len(), 12);
        for colors in lit.face_colors.iter() {
            for &c in colors.iter().filter(|&&c| c != FLAT_SHADED) {
                assert!((2..=126).contains(&lightness_of(c)), "lightness of {c} under {lx},{ly},{lz}");
            }
        }
    }
}

struct Flat(i32);

impl CornerHeights for Flat {
    fn corners(&self) -> usize {
        17
    }
    fn corner(&self, _: usize, _: usize) -> i32 {
        self.0
    }
}

#[test]
fn contour_on_level_ground_shares_the_mesh() {
    let lit = Arc::new(light(&common::box_mesh(64, 128, 7), 64, 768, -50, -10, -50));
    for mode in [ContourMode::Uniform, ContourMode::Clipped { threshold: 65536 }] {
        let out = contour(&lit, &Flat(-24), 1024, -24, 1024, mode);
        assert!(Arc::ptr_eq(&lit, &out));
    }
}
