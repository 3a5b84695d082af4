use image::{GrayImage, Luma};
use imageproc::filter::separable_filter_equal;
use ndarray::Array2;

use super::config::{BlurSpec, RingConfig, ScaleOffset};
use super::edges::canny_edges;
use super::peaks::find_peaks;
use super::stats::BoxplotStats;
use super::AnalysisError;

#[derive(Debug, Clone)]
pub struct RingScan {
    pub edges: GrayImage,
    /// Rows are angles, columns are radii.
    pub polar: Array2<u8>,
    pub scan_rows: Vec<usize>,
    pub counts: Vec<u32>,
    pub stats: BoxplotStats,
}

fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// `lut[i] = (i / 255)^(1 / gamma) * 255`, truncated.
pub fn gamma_lut(gamma: f32) -> [u8; 256] {
    let inv_gamma = 1.0 / gamma as f64;
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = ((i as f64 / 255.0).powf(inv_gamma) * 255.0) as u8;
    }
    lut
}

fn map_pixels(image: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([f(image.get_pixel(x, y)[0])])
    })
}

pub fn invert(image: &GrayImage) -> GrayImage {
    map_pixels(image, |v| 255 - v)
}

pub fn apply_lut(image: &GrayImage, lut: &[u8; 256]) -> GrayImage {
    map_pixels(image, |v| lut[v as usize])
}

/// `saturate(|alpha * v + beta|)`
pub fn convert_scale_abs(image: &GrayImage, adjust: ScaleOffset) -> GrayImage {
    map_pixels(image, |v| saturate((adjust.alpha * v as f32 + adjust.beta).abs()))
}

/// `saturate(wa * a + wb * b)`, both images of the same size.
pub fn add_weighted(a: &GrayImage, wa: f32, b: &GrayImage, wb: f32) -> GrayImage {
    GrayImage::from_fn(a.width(), a.height(), |x, y| {
        let va = a.get_pixel(x, y)[0] as f32;
        let vb = b.get_pixel(x, y)[0] as f32;
        Luma([saturate(wa * va + wb * vb)])
    })
}

/// Normalized 1-D Gaussian taps of an explicit odd size.
pub fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let center = (size as f32 - 1.0) / 2.0;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let taps: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / two_sigma_sq).exp()
        })
        .collect();
    let sum: f32 = taps.iter().sum();
    taps.into_iter().map(|t| t / sum).collect()
}

pub fn gaussian_blur(image: &GrayImage, blur: BlurSpec) -> GrayImage {
    let kernel = gaussian_kernel(blur.kernel, blur.sigma);
    separable_filter_equal(image, &kernel)
}

/// Contrast boost followed by unsharp masking and a light smoothing pass;
/// the output is what the edge detector sees.
pub fn enhance_rings(gray: &GrayImage, config: &RingConfig) -> GrayImage {
    let lut = gamma_lut(config.gamma);
    let boosted = apply_lut(&invert(gray), &lut);
    let mut enhanced = invert(&boosted);
    for adjust in &config.contrast {
        enhanced = convert_scale_abs(&enhanced, *adjust);
    }

    let blurred = gaussian_blur(&enhanced, config.sharpen_blur);
    let (w_orig, w_blur) = config.sharpen_weights;
    let sharpened = add_weighted(&enhanced, w_orig, &blurred, w_blur);
    gaussian_blur(&sharpened, config.smooth_blur)
}

/// Distance from `center` to the farthest image corner, truncated.
pub fn max_radius(width: u32, height: u32, center: (i32, i32)) -> usize {
    let (cx, cy) = (center.0 as f64, center.1 as f64);
    let dx = cx.max(width as f64 - cx);
    let dy = cy.max(height as f64 - cy);
    dx.hypot(dy) as usize
}

fn sample_nearest(image: &GrayImage, x: f64, y: f64) -> u8 {
    let (xi, yi) = (x.round() as i64, y.round() as i64);
    if xi < 0 || yi < 0 || xi >= image.width() as i64 || yi >= image.height() as i64 {
        0
    } else {
        image.get_pixel(xi as u32, yi as u32)[0]
    }
}

/// Linear polar warp around `center`: `rows` angle samples covering the full
/// turn, `radial_bins` radius samples covering `0..max_radius`. Samples take
/// the nearest pixel, so a binary edge map stays binary.
pub fn polar_remap(
    image: &GrayImage,
    center: (i32, i32),
    radial_bins: usize,
    max_radius: usize,
) -> Array2<u8> {
    let rows = max_radius.max(1);
    let (cx, cy) = (center.0 as f64, center.1 as f64);
    let radius_step = max_radius as f64 / radial_bins as f64;
    let angle_step = std::f64::consts::TAU / rows as f64;

    Array2::from_shape_fn((rows, radial_bins), |(row, col)| {
        let angle = row as f64 * angle_step;
        let rho = col as f64 * radius_step;
        sample_nearest(image, cx + rho * angle.cos(), cy + rho * angle.sin())
    })
}

/// Zeroes every value at or below `threshold`; the rest are kept.
pub fn threshold_to_zero(polar: &mut Array2<u8>, threshold: u8) {
    polar.mapv_inplace(|v| if v > threshold { v } else { 0 });
}

/// `count` evenly spaced indices from 0 to `len - 1` inclusive, truncated.
pub fn linspace_indices(len: usize, count: usize) -> Vec<usize> {
    if count == 1 || len <= 1 {
        return vec![0; count];
    }
    let last = (len - 1) as f64;
    let step = last / (count - 1) as f64;
    (0..count)
        .map(|i| {
            if i == count - 1 {
                len - 1
            } else {
                (i as f64 * step) as usize
            }
        })
        .collect()
}

/// Counts edge crossings along each sampled radial line.
pub fn scan_rings(polar: &Array2<u8>, lines: usize, peak_distance: usize) -> (Vec<usize>, Vec<u32>) {
    let rows = linspace_indices(polar.nrows(), lines);
    let counts = rows
        .iter()
        .map(|&r| {
            let binary: Vec<u8> = polar.row(r).iter().map(|&v| u8::from(v > 0)).collect();
            find_peaks(&binary, peak_distance).len() as u32
        })
        .collect();
    (rows, counts)
}

pub fn analyze_rings(
    gray: &GrayImage,
    center: (i32, i32),
    config: &RingConfig,
) -> Result<RingScan, AnalysisError> {
    let enhanced = enhance_rings(gray, config);
    let edges = canny_edges(&enhanced, config.canny_low, config.canny_high);

    let radius = max_radius(gray.width(), gray.height(), center);
    let mut polar = polar_remap(&edges, center, config.radial_bins, radius);
    threshold_to_zero(&mut polar, config.polar_threshold);
    log::debug!(
        "Polar map {}x{} around ({}, {})",
        polar.nrows(),
        polar.ncols(),
        center.0,
        center.1
    );

    let (scan_rows, counts) = scan_rings(&polar, config.scan_lines, config.peak_distance);
    let stats = BoxplotStats::from_counts(&counts)
        .ok_or_else(|| AnalysisError::Config("no scan lines configured".into()))?;

    Ok(RingScan {
        edges,
        polar,
        scan_rows,
        counts,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Concentric bright rings every `spacing` pixels on a dark background.
    fn ring_image(size: u32, spacing: f64) -> GrayImage {
        let c = size as f64 / 2.0;
        GrayImage::from_fn(size, size, |x, y| {
            let r = ((x as f64 - c).powi(2) + (y as f64 - c).powi(2)).sqrt();
            if (r / spacing).fract() < 0.3 { Luma([230]) } else { Luma([40]) }
        })
    }

    #[test]
    fn gamma_lut_endpoints_and_monotonicity() {
        let lut = gamma_lut(2.5);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[255], 255);
        assert!(lut.windows(2).all(|w| w[0] <= w[1]));
        // gamma > 1 lifts midtones of the inverted image
        assert!(lut[64] > 64);
    }

    #[test]
    fn convert_scale_abs_saturates_and_folds_negatives() {
        let img = GrayImage::from_vec(3, 1, vec![0, 10, 250]).unwrap();
        let out = convert_scale_abs(&img, ScaleOffset { alpha: 1.2, beta: -20.0 });
        assert_eq!(out.as_raw(), &vec![20, 8, 255]);
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(7, 10.0);
        assert_eq!(k.len(), 7);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[0] - k[6]).abs() < 1e-7);
        assert!(k[3] >= k[0]);
    }

    #[test]
    fn uniform_image_survives_blur() {
        let img = GrayImage::from_pixel(9, 9, Luma([100]));
        let out = gaussian_blur(&img, BlurSpec { kernel: 3, sigma: 1.0 });
        assert!(out.pixels().all(|p| (p[0] as i32 - 100).abs() <= 1));
    }

    #[test]
    fn max_radius_reaches_farthest_corner() {
        assert_eq!(max_radius(100, 50, (0, 0)), 111);
        assert_eq!(max_radius(100, 100, (50, 50)), 70);
        assert!(max_radius(1, 1, (0, 0)) >= 1);
    }

    #[test]
    fn polar_row_zero_walks_to_the_right() {
        let mut img = GrayImage::new(40, 40);
        for x in 20..40 {
            img.put_pixel(x, 20, Luma([255]));
        }
        let polar = polar_remap(&img, (20, 20), 36, 20);
        assert_eq!(polar.dim(), (20, 36));
        assert!(polar.row(0).iter().take(30).all(|&v| v == 255));
        // a quarter turn later the ray points down, away from the line
        assert!(polar.row(5).iter().skip(2).all(|&v| v == 0));
    }

    #[test]
    fn polar_map_of_an_edge_map_stays_binary() {
        let img = ring_image(120, 7.0);
        let edges = GrayImage::from_fn(120, 120, |x, y| {
            if img.get_pixel(x, y)[0] > 100 { Luma([255]) } else { Luma([0]) }
        });
        let polar = polar_remap(&edges, (53, 61), 360, max_radius(120, 120, (53, 61)));
        assert!(polar.iter().all(|&v| v == 0 || v == 255));
        assert!(polar.iter().any(|&v| v == 255));
    }

    #[test]
    fn threshold_zeroes_faint_values_only() {
        let mut a = Array2::from_shape_vec((1, 4), vec![0u8, 15, 16, 200]).unwrap();
        threshold_to_zero(&mut a, 15);
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), vec![0, 0, 16, 200]);
    }

    #[test]
    fn linspace_matches_inclusive_endpoints() {
        assert_eq!(linspace_indices(39, 20), (0..20).map(|i| i * 2).collect::<Vec<_>>());
        let idx = linspace_indices(500, 20);
        assert_eq!(idx.len(), 20);
        assert_eq!(idx[0], 0);
        assert_eq!(idx[19], 499);
        assert_eq!(linspace_indices(1, 20), vec![0; 20]);
    }

    #[test]
    fn always_twenty_counts() {
        let config = RingConfig::default();
        for size in [8u32, 33, 120] {
            let img = ring_image(size, 6.0);
            let scan = analyze_rings(&img, (size as i32 / 2, size as i32 / 2), &config).unwrap();
            assert_eq!(scan.counts.len(), 20);
            assert_eq!(scan.scan_rows.len(), 20);
            assert_eq!(scan.polar.ncols(), 360);
        }
    }

    #[test]
    fn concentric_rings_produce_crossings() {
        let img = ring_image(200, 12.0);
        let scan = analyze_rings(&img, (100, 100), &RingConfig::default()).unwrap();
        assert!(scan.stats.median > 0.0);
        assert_eq!(scan.edges.dimensions(), (200, 200));
    }
}
