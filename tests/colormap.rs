use heroine_graph::colormap::{lut_rgba8, sample};
use heroine_graph::ColorScale;

const ALL: [ColorScale; 5] = [
    ColorScale::Viridis,
    ColorScale::Plasma,
    ColorScale::Inferno,
    ColorScale::Magma,
    ColorScale::Turbo,
];

#[test]
fn samples_stay_in_unit_range() {
    for scale in ALL {
        for i in 0..=100 {
            let t = i as f32 / 100.0;
            let [r, g, b] = sample(scale, t);
            assert!((0.0..=1.0).contains(&r), "{scale:?} r({t}) = {r}");
            assert!((0.0..=1.0).contains(&g), "{scale:?} g({t}) = {g}");
            assert!((0.0..=1.0).contains(&b), "{scale:?} b({t}) = {b}");
        }
    }
}

#[test]
fn out_of_range_input_clamps() {
    for scale in ALL {
        assert_eq!(sample(scale, -3.0), sample(scale, 0.0));
        assert_eq!(sample(scale, 42.0), sample(scale, 1.0));
    }
}

#[test]
fn sequential_scales_start_dark_and_end_bright() {
    // Viridis/plasma/inferno/magma all run dark → bright.
    for scale in [ColorScale::Viridis, ColorScale::Plasma, ColorScale::Inferno, ColorScale::Magma] {
        let lum = |t: f32| {
            let [r, g, b] = sample(scale, t);
            0.2126 * r + 0.7152 * g + 0.0722 * b
        };
        assert!(lum(0.0) < 0.25, "{scale:?} starts at luminance {}", lum(0.0));
        assert!(lum(1.0) > 0.6, "{scale:?} ends at luminance {}", lum(1.0));
        assert!(lum(1.0) > lum(0.0));
    }
}

#[test]
fn viridis_endpoints_match_reference_palette() {
    // Loose tolerance: the polynomial fit is within a few 8-bit steps.
    let [r0, g0, b0] = sample(ColorScale::Viridis, 0.0);
    assert!((r0 - 0.267).abs() < 0.08 && (g0 - 0.005).abs() < 0.08 && (b0 - 0.329).abs() < 0.08);
    let [r1, g1, b1] = sample(ColorScale::Viridis, 1.0);
    assert!((r1 - 0.993).abs() < 0.08 && (g1 - 0.906).abs() < 0.08 && (b1 - 0.144).abs() < 0.08);
}

#[test]
fn turbo_is_blue_to_red() {
    let [r0, _, b0] = sample(ColorScale::Turbo, 0.0);
    let [r1, _, b1] = sample(ColorScale::Turbo, 1.0);
    assert!(b0 > r0, "turbo(0) should be blue: r={r0} b={b0}");
    assert!(r1 > b1, "turbo(1) should be red: r={r1} b={b1}");
}

#[test]
fn scales_are_pairwise_distinct() {
    for (i, a) in ALL.iter().enumerate() {
        for b in &ALL[i + 1..] {
            let differs = (0..=10).any(|k| {
                let t = k as f32 / 10.0;
                let pa = sample(*a, t);
                let pb = sample(*b, t);
                pa.iter().zip(pb).any(|(x, y)| (x - y).abs() > 0.05)
            });
            assert!(differs, "{a:?} and {b:?} look identical");
        }
    }
}

#[test]
fn lut_has_256_opaque_entries() {
    for scale in ALL {
        let lut = lut_rgba8(scale);
        assert_eq!(lut.len(), 256);
        assert!(lut.iter().all(|px| px[3] == 255));
    }
}

#[test]
fn lut_matches_direct_samples() {
    let lut = lut_rgba8(ColorScale::Viridis);
    for &i in &[0usize, 64, 128, 255] {
        let [r, g, b] = sample(ColorScale::Viridis, i as f32 / 255.0);
        assert_eq!(lut[i][0], (r * 255.0).round() as u8);
        assert_eq!(lut[i][1], (g * 255.0).round() as u8);
        assert_eq!(lut[i][2], (b * 255.0).round() as u8);
    }
}
