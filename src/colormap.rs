//! Color-scale lookup tables for the heatmap layer.
//!
//! Each scale is evaluated from a published polynomial fit and baked into a
//! 256-entry RGBA8 LUT; the heatmap shader samples the LUT as a 256×1
//! texture.  Fits are accurate to a couple of 8-bit steps against the
//! reference palettes, which is below what an additive density overlay can
//! show.

// ── ColorScale ────────────────────────────────────────────────────────────────

/// Selectable heatmap palette.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ColorScale {
    #[default]
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Turbo,
}

/// Evaluate a scale at `t ∈ [0, 1]`, returning linear RGB.
pub fn sample(scale: ColorScale, t: f32) -> [f32; 3] {
    let t = t.clamp(0.0, 1.0);
    let rgb = match scale {
        ColorScale::Viridis => poly6(t, &VIRIDIS),
        ColorScale::Plasma => poly6(t, &PLASMA),
        ColorScale::Inferno => poly6(t, &INFERNO),
        ColorScale::Magma => poly6(t, &MAGMA),
        ColorScale::Turbo => turbo(t),
    };
    rgb.map(|c| c.clamp(0.0, 1.0))
}

/// Bake the 256×1 RGBA8 LUT for a scale (alpha fixed at 255).
pub fn lut_rgba8(scale: ColorScale) -> Vec<[u8; 4]> {
    (0..256)
        .map(|i| {
            let [r, g, b] = sample(scale, i as f32 / 255.0);
            [
                (r * 255.0).round() as u8,
                (g * 255.0).round() as u8,
                (b * 255.0).round() as u8,
                255,
            ]
        })
        .collect()
}

// ── Polynomial fits ───────────────────────────────────────────────────────────
//
// Degree-6 per-channel fits of the matplotlib palettes (coefficients in
// ascending power order, one [r, g, b] triple per power).

type Poly6 = [[f32; 3]; 7];

fn poly6(t: f32, c: &Poly6) -> [f32; 3] {
    let mut rgb = [0.0f32; 3];
    let mut tn = 1.0;
    for coeff in c {
        for (channel, k) in rgb.iter_mut().zip(coeff) {
            *channel += k * tn;
        }
        tn *= t;
    }
    rgb
}

const VIRIDIS: Poly6 = [
    [0.277_727_3, 0.005_407_34, 0.334_099_8],
    [0.105_093_04, 1.404_613_5, 1.384_590_2],
    [-0.330_861_83, 0.214_847_56, 0.095_095_16],
    [-4.634_230_5, -5.799_101_0, -19.332_441],
    [6.228_270_0, 14.179_933, 56.690_552],
    [4.776_385_0, -13.745_145, -65.353_03],
    [-5.435_455_9, 4.645_852_6, 26.312_435],
];

const PLASMA: Poly6 = [
    [0.058_732_34, 0.023_336_71, 0.543_340_2],
    [2.176_514_6, 0.238_383_42, 0.753_960_46],
    [-2.689_460_4, -7.455_851_0, 3.110_800_0],
    [6.130_348_3, 42.346_188, -28.518_855],
    [-11.107_436, -82.666_31, 60.139_848],
    [10.023_066, 71.413_62, -54.072_187],
    [-3.658_713_8, -22.931_535, 18.191_908],
];

const INFERNO: Poly6 = [
    [0.000_218_94, 0.001_651_00, -0.019_480_9],
    [0.106_513_42, 0.563_956_44, 3.932_712_4],
    [11.602_493, -3.972_854_0, -15.942_394],
    [-41.703_996, 17.436_399, 44.354_145],
    [77.162_94, -33.402_359, -81.807_31],
    [-71.319_43, 32.626_064, 73.209_52],
    [25.131_126, -12.242_669, -23.070_325],
];

const MAGMA: Poly6 = [
    [-0.002_136_49, -0.000_749_66, -0.005_386_13],
    [0.251_660_54, 0.677_523_24, 2.494_026_6],
    [8.353_717_0, -3.577_719_5, 0.314_467_9],
    [-27.668_733, 14.264_731, -13.649_213],
    [52.176_14, -27.943_606, 12.944_169],
    [-50.768_524, 29.046_583, 4.234_153_0],
    [18.655_705, -11.489_774, -5.601_961_5],
];

/// Turbo uses the dedicated quintic fit (separate low/high coefficients).
fn turbo(t: f32) -> [f32; 3] {
    let v4 = [1.0, t, t * t, t * t * t];
    let v2 = [t * t * t * t, t * t * t * t * t];
    let dot4 = |k: [f32; 4]| k[0] * v4[0] + k[1] * v4[1] + k[2] * v4[2] + k[3] * v4[3];
    let dot2 = |k: [f32; 2]| k[0] * v2[0] + k[1] * v2[1];
    [
        dot4([0.135_721_38, 4.615_392_6, -42.660_324, 132.131_08])
            + dot2([-152.942_4, 59.286_38]),
        dot4([0.091_402_61, 2.194_188_4, 4.842_966_6, -14.185_033])
            + dot2([4.277_298_6, 2.829_566_0]),
        dot4([0.106_673_3, 12.641_946, -60.582_05, 110.362_77])
            + dot2([-89.903_11, 27.348_25]),
    ]
}
