use heroine_graph::layers::labels::{layout_text, CollisionGrid, MsdfFont};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// Minimal msdf-atlas-gen metadata with glyphs for 'A', 'B' and a space.
fn sample_json() -> &'static str {
    r#"{
        "atlas": { "type": "mtsdf", "width": 512, "height": 512, "distanceRange": 4.0 },
        "metrics": { "lineHeight": 1.0, "ascender": -0.8, "descender": 0.2 },
        "glyphs": [
            {
                "unicode": 65, "advance": 0.6,
                "planeBounds": { "left": 0.05, "top": -0.8, "right": 0.55, "bottom": 0.2 },
                "atlasBounds": { "left": 0,    "top": 0,    "right": 14,   "bottom": 20  }
            },
            {
                "unicode": 66, "advance": 0.55,
                "planeBounds": { "left": 0.05, "top": -0.8, "right": 0.50, "bottom": 0.2 },
                "atlasBounds": { "left": 16,   "top": 0,    "right": 29,   "bottom": 20  }
            },
            { "unicode": 32, "advance": 0.3 }
        ],
        "kerning": [
            { "unicode1": 65, "unicode2": 66, "advance": -0.1 }
        ]
    }"#
}

fn make_font() -> MsdfFont {
    MsdfFont::from_json(sample_json()).unwrap()
}

// ── Font parsing ──────────────────────────────────────────────────────────────

#[test]
fn from_json_parses_metadata() {
    let font = make_font();
    assert_eq!(font.line_height, 1.0);
    assert_eq!(font.ascender, -0.8);
    assert_eq!(font.descender, 0.2);
    assert_eq!(font.atlas_width, 512);
    assert_eq!(font.atlas_height, 512);
    assert_eq!(font.distance_range, 4.0);
    assert_eq!(font.glyphs.len(), 3);
}

#[test]
fn from_json_reads_kerning_pairs() {
    let font = make_font();
    assert_eq!(font.kerning.get(&('A', 'B')), Some(&-0.1));
    assert!(font.kerning.get(&('B', 'A')).is_none());
}

#[test]
fn from_json_invalid_input_is_an_error() {
    assert!(MsdfFont::from_json("not json").is_err());
}

#[test]
fn from_json_skips_surrogate_codepoints() {
    let json = r#"{
        "atlas": { "width": 256, "height": 256, "distanceRange": 4.0 },
        "metrics": { "lineHeight": 1.0 },
        "glyphs": [ { "unicode": 55296, "advance": 0.6 } ],
        "kerning": []
    }"#;
    let font = MsdfFont::from_json(json).unwrap();
    assert!(font.glyphs.is_empty());
}

// ── Layout ────────────────────────────────────────────────────────────────────

#[test]
fn layout_empty_string_is_empty() {
    let (quads, min, max) = layout_text(&make_font(), "", 14.0);
    assert!(quads.is_empty());
    assert_eq!(min.x, 0.0);
    assert_eq!(max.x, 0.0);
}

#[test]
fn layout_single_glyph_scales_plane_bounds() {
    let (quads, _, _) = layout_text(&make_font(), "A", 20.0);
    assert_eq!(quads.len(), 1);
    let q = quads[0];
    assert!((q.offset[0] - 0.05 * 20.0).abs() < 1e-4);
    assert!((q.offset[1] - (-0.8 * 20.0)).abs() < 1e-4);
    assert!((q.size[0] - 0.5 * 20.0).abs() < 1e-4);
    assert!((q.size[1] - 1.0 * 20.0).abs() < 1e-4);
    // Atlas rect normalised to [0,1].
    assert!((q.uv_min[0] - 0.0).abs() < 1e-6);
    assert!((q.uv_max[0] - 14.0 / 512.0).abs() < 1e-6);
    assert!((q.uv_max[1] - 20.0 / 512.0).abs() < 1e-6);
}

#[test]
fn layout_applies_advance_and_kerning() {
    let font = make_font();
    let (quads, _, _) = layout_text(&font, "AB", 10.0);
    assert_eq!(quads.len(), 2);
    // B's pen = A advance (0.6) + kerning (−0.1), plus B's plane left.
    let expected = (0.6 - 0.1 + 0.05) * 10.0;
    assert!((quads[1].offset[0] - expected).abs() < 1e-4, "got {}", quads[1].offset[0]);
}

#[test]
fn layout_space_advances_without_a_quad() {
    let font = make_font();
    let (quads, _, _) = layout_text(&font, "A A", 10.0);
    assert_eq!(quads.len(), 2);
    let gap = quads[1].offset[0] - quads[0].offset[0];
    assert!((gap - (0.6 + 0.3) * 10.0).abs() < 1e-4);
}

#[test]
fn layout_skips_unknown_glyphs_without_fallback() {
    // The fixture has no U+FFFD and no '?', so unknown chars vanish.
    let font = make_font();
    let (quads, _, _) = layout_text(&font, "AZB", 10.0);
    assert_eq!(quads.len(), 2);
}

#[test]
fn layout_bbox_encloses_all_quads() {
    let (quads, min, max) = layout_text(&make_font(), "ABA", 16.0);
    for q in &quads {
        assert!(q.offset[0] >= min.x - 1e-4);
        assert!(q.offset[1] >= min.y - 1e-4);
        assert!(q.offset[0] + q.size[0] <= max.x + 1e-4);
        assert!(q.offset[1] + q.size[1] <= max.y + 1e-4);
    }
}

// ── Collision grid ────────────────────────────────────────────────────────────

#[test]
fn grid_accepts_disjoint_boxes() {
    let mut grid = CollisionGrid::new(18.0);
    assert!(grid.try_insert([0.0, 0.0, 50.0, 14.0]));
    assert!(grid.try_insert([60.0, 0.0, 110.0, 14.0]));
    assert!(grid.try_insert([0.0, 30.0, 50.0, 44.0]));
    assert_eq!(grid.len(), 3);
}

#[test]
fn grid_rejects_overlap() {
    let mut grid = CollisionGrid::new(18.0);
    assert!(grid.try_insert([0.0, 0.0, 50.0, 14.0]));
    assert!(!grid.try_insert([25.0, 5.0, 75.0, 19.0]));
    assert_eq!(grid.len(), 1);
}

#[test]
fn grid_edge_touching_boxes_do_not_collide() {
    let mut grid = CollisionGrid::new(18.0);
    assert!(grid.try_insert([0.0, 0.0, 50.0, 14.0]));
    assert!(grid.try_insert([50.0, 0.0, 100.0, 14.0]));
}

#[test]
fn grid_detects_overlap_across_cell_boundaries() {
    // A big box spanning many cells must still collide with a small one.
    let mut grid = CollisionGrid::new(10.0);
    assert!(grid.try_insert([0.0, 0.0, 200.0, 200.0]));
    assert!(!grid.try_insert([150.0, 150.0, 160.0, 160.0]));
}

#[test]
fn ten_identical_boxes_place_exactly_one() {
    // Ten colocated labels: the greedy pass keeps only the first.
    let mut grid = CollisionGrid::new(18.0);
    let mut placed = 0;
    for _ in 0..10 {
        if grid.try_insert([100.0, 100.0, 170.0, 114.0]) {
            placed += 1;
        }
    }
    assert_eq!(placed, 1);
}

#[test]
fn negative_coordinates_work() {
    let mut grid = CollisionGrid::new(18.0);
    assert!(grid.try_insert([-100.0, -50.0, -40.0, -36.0]));
    assert!(!grid.try_insert([-60.0, -45.0, -10.0, -31.0]));
}
