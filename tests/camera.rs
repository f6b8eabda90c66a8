use glam::Vec2;

use heroine_graph::camera::{Camera, ZOOM_MAX, ZOOM_MIN};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn camera() -> Camera {
    Camera::new(800.0, 600.0, 1.0)
}

fn close(a: Vec2, b: Vec2, tol: f32) -> bool {
    (a.x - b.x).abs() < tol && (a.y - b.y).abs() < tol
}

// ── Transforms ────────────────────────────────────────────────────────────────

#[test]
fn world_clip_round_trip_is_exact_enough() {
    let mut cam = camera();
    cam.center = Vec2::new(12.5, -40.0);
    cam.zoom = 3.7;
    for &(x, y) in &[(0.0, 0.0), (100.0, -250.0), (-3.25, 917.0), (1e4, -1e4)] {
        let p = Vec2::new(x, y);
        let back = cam.clip_to_world(cam.world_to_clip(p));
        assert!(
            (back.x - p.x).abs() < 1e-5 * p.x.abs().max(1.0),
            "x round trip failed for {p:?}: {back:?}"
        );
        assert!(
            (back.y - p.y).abs() < 1e-5 * p.y.abs().max(1.0),
            "y round trip failed for {p:?}: {back:?}"
        );
    }
}

#[test]
fn camera_center_maps_to_screen_center() {
    let mut cam = camera();
    cam.center = Vec2::new(55.0, 20.0);
    let screen = cam.world_to_screen(cam.center);
    assert!(close(screen, Vec2::new(400.0, 300.0), 1e-3));
}

#[test]
fn screen_world_round_trip() {
    let mut cam = camera();
    cam.center = Vec2::new(-7.0, 3.0);
    cam.zoom = 0.5;
    let px = Vec2::new(123.0, 456.0);
    let back = cam.world_to_screen(cam.screen_to_world(px));
    assert!(close(back, px, 1e-3));
}

#[test]
fn screen_y_is_down_world_y_is_up() {
    let cam = camera();
    let above = cam.world_to_screen(Vec2::new(0.0, 10.0));
    let below = cam.world_to_screen(Vec2::new(0.0, -10.0));
    assert!(above.y < below.y);
}

// ── Pan & zoom ────────────────────────────────────────────────────────────────

#[test]
fn pan_keeps_dragged_world_point_under_cursor() {
    let mut cam = camera();
    cam.zoom = 2.0;
    let start_px = Vec2::new(200.0, 200.0);
    let world = cam.screen_to_world(start_px);
    cam.pan(30.0, -45.0);
    let moved = cam.world_to_screen(world);
    assert!(close(moved, start_px + Vec2::new(30.0, -45.0), 1e-3));
}

#[test]
fn zoom_clamps_to_limits() {
    let mut cam = camera();
    cam.zoom_by(1e12, None);
    assert_eq!(cam.zoom, ZOOM_MAX);
    cam.zoom_by(1e-24, None);
    assert_eq!(cam.zoom, ZOOM_MIN);
}

#[test]
fn anchored_zoom_fixes_the_anchor_point() {
    let mut cam = camera();
    cam.center = Vec2::new(10.0, -5.0);
    let anchor = Vec2::new(600.0, 120.0);
    let world_before = cam.screen_to_world(anchor);
    cam.zoom_by(2.5, Some(anchor));
    let world_after = cam.screen_to_world(anchor);
    assert!(close(world_before, world_after, 1e-3));
}

// ── fit_to_view ───────────────────────────────────────────────────────────────

#[test]
fn fit_centers_on_bbox() {
    let mut cam = camera();
    cam.fit_to_view(Vec2::new(-10.0, -10.0), Vec2::new(30.0, 10.0), 0.10);
    assert!(close(cam.center, Vec2::new(10.0, 0.0), 1e-5));
}

#[test]
fn fit_makes_longer_axis_fit_with_padding() {
    let mut cam = camera();
    // 40 wide × 20 tall in an 800×600 viewport: x limits.
    cam.fit_to_view(Vec2::new(-20.0, -10.0), Vec2::new(20.0, 10.0), 0.10);
    let expected = 800.0 / (40.0 * 1.2);
    assert!((cam.zoom - expected).abs() < 1e-3, "zoom = {}", cam.zoom);

    // The padded bbox corners land inside the viewport.
    let corner = cam.world_to_screen(Vec2::new(20.0, 10.0));
    assert!(corner.x <= 800.0 + 1e-3 && corner.y >= -1e-3);
}

#[test]
fn fit_degenerate_bbox_only_recenters() {
    let mut cam = camera();
    let zoom_before = cam.zoom;
    cam.fit_to_view(Vec2::new(5.0, 5.0), Vec2::new(5.0, 5.0), 0.10);
    assert!(close(cam.center, Vec2::new(5.0, 5.0), 1e-6));
    assert_eq!(cam.zoom, zoom_before);
}

// ── Frame uniform ─────────────────────────────────────────────────────────────

#[test]
fn frame_uniform_matches_world_to_clip() {
    let mut cam = camera();
    cam.center = Vec2::new(3.0, 4.0);
    cam.zoom = 2.0;
    let uniform = cam.frame_uniform(1.25);
    let p = Vec2::new(17.0, -6.0);

    let row_x = uniform.clip_from_world_x;
    let row_y = uniform.clip_from_world_y;
    let clip = Vec2::new(
        row_x[0] * p.x + row_x[1] * p.y + row_x[3],
        row_y[0] * p.x + row_y[1] * p.y + row_y[3],
    );
    assert!(close(clip, cam.world_to_clip(p), 1e-5));
    assert_eq!(uniform.viewport, [800.0, 600.0]);
    assert_eq!(uniform.time, 1.25);
}
