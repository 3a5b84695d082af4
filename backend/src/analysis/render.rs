use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use ndarray::Array2;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{FontStyle, register_font};
use std::io::Cursor;

use super::AnalysisError;
use super::stats::BoxplotStats;

const CAPTION_FONT: &str = "caption";
const MARGIN: u32 = 20;
const TITLE_BAND: u32 = 44;
const BOX_COLOR: RGBColor = RGBColor(0x4c, 0x72, 0xb0);
const GRID_COLOR: RGBColor = RGBColor(220, 220, 220);
const SCAN_LINE_COLOR: RGBColor = RGBColor(0, 255, 255);

fn render_err<E: std::fmt::Display>(e: E) -> AnalysisError {
    AnalysisError::Render(e.to_string())
}

/// Base64 of the PNG encoding of `image`.
pub fn encode_png(image: &RgbImage) -> Result<String, AnalysisError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(AnalysisError::Encode)?;
    Ok(STANDARD.encode(buf))
}

pub fn gray_to_rgb(gray: &GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(gray.clone()).to_rgb8()
}

pub fn polar_to_image(polar: &Array2<u8>) -> GrayImage {
    let (rows, cols) = polar.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([polar[[y as usize, x as usize]]])
    })
}

/// Composes diagnostic figures. Titles are drawn only when a caption font was
/// registered at startup; everything else renders without one.
#[derive(Clone, Debug, Default)]
pub struct Renderer {
    captions: bool,
}

impl Renderer {
    pub fn new(font_path: Option<&str>) -> Self {
        let Some(path) = font_path else {
            log::warn!("FONT_PATH not set, figures will be rendered without captions");
            return Self { captions: false };
        };
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to read caption font {}: {}", path, e);
                return Self { captions: false };
            }
        };
        // registered fonts live for the whole process
        let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        match register_font(CAPTION_FONT, FontStyle::Normal, bytes) {
            Ok(()) => {
                log::info!("Registered caption font from {}", path);
                Self { captions: true }
            }
            Err(_) => {
                log::warn!(
                    "{} is not a usable font, figures will be rendered without captions",
                    path
                );
                Self { captions: false }
            }
        }
    }

    pub fn captions_enabled(&self) -> bool {
        self.captions
    }

    fn draw_caption(
        &self,
        area: &DrawingArea<BitMapBackend<'_>, Shift>,
        text: &str,
        pos: (i32, i32),
        size: u32,
    ) -> Result<(), AnalysisError> {
        if !self.captions_enabled() {
            return Ok(());
        }
        let style = (CAPTION_FONT, size).into_font().color(&BLACK);
        area.draw(&Text::new(text.to_string(), pos, style))
            .map_err(render_err)
    }

    /// Places `panels` left to right on a white canvas, each under its title.
    fn panels(&self, panels: &[(&RgbImage, String)]) -> Result<RgbImage, AnalysisError> {
        let width = panels.iter().map(|(img, _)| img.width() + MARGIN).sum::<u32>() + MARGIN;
        let height = panels.iter().map(|(img, _)| img.height()).max().unwrap_or(0)
            + TITLE_BAND
            + 2 * MARGIN;
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        let mut x = MARGIN;
        let mut offsets = Vec::with_capacity(panels.len());
        for (img, _) in panels {
            imageops::replace(&mut canvas, *img, x as i64, (MARGIN + TITLE_BAND) as i64);
            offsets.push(x);
            x += img.width() + MARGIN;
        }

        {
            let buf: &mut [u8] = &mut canvas;
            let root = BitMapBackend::with_buffer(buf, (width, height)).into_drawing_area();
            for ((_, title), x) in panels.iter().zip(offsets) {
                self.draw_caption(&root, title, (x as i32, MARGIN as i32), 22)?;
            }
            root.present().map_err(render_err)?;
        }
        Ok(canvas)
    }

    pub fn defect_figure(
        &self,
        original: &RgbImage,
        overlay: &RgbImage,
        defect_ratio: f64,
    ) -> Result<RgbImage, AnalysisError> {
        self.panels(&[
            (original, "Original Image".to_string()),
            (
                overlay,
                format!("Overlay - Defect Ratio: {:.2}%", defect_ratio),
            ),
        ])
    }

    pub fn edge_figure(&self, edges: &GrayImage) -> Result<RgbImage, AnalysisError> {
        self.panels(&[(&gray_to_rgb(edges), "Canny Edge Detection".to_string())])
    }

    /// Polar map with a dashed line across every sampled row.
    pub fn polar_figure(
        &self,
        polar: &Array2<u8>,
        scan_rows: &[usize],
    ) -> Result<RgbImage, AnalysisError> {
        let mut map = gray_to_rgb(&polar_to_image(polar));
        let (w, h) = map.dimensions();
        {
            let buf: &mut [u8] = &mut map;
            let root = BitMapBackend::with_buffer(buf, (w, h)).into_drawing_area();
            for &row in scan_rows {
                let y = row as i32;
                for x in (0..w as i32).step_by(8) {
                    root.draw(&PathElement::new(
                        vec![(x, y), ((x + 4).min(w as i32 - 1), y)],
                        SCAN_LINE_COLOR,
                    ))
                    .map_err(render_err)?;
                }
            }
            root.present().map_err(render_err)?;
        }
        self.panels(&[(&map, "Polar Transform with Scan Lines".to_string())])
    }

    /// Vertical box plot: box from Q1 to Q3, median line, whiskers to the
    /// extreme non-outlier counts, outliers as open circles.
    pub fn boxplot_figure(
        &self,
        counts: &[u32],
        stats: &BoxplotStats,
    ) -> Result<RgbImage, AnalysisError> {
        const WIDTH: u32 = 600;
        const HEIGHT: u32 = 800;
        const LEFT: i32 = 100;
        const RIGHT: i32 = 540;
        const TOP: i32 = 90;
        const BOTTOM: i32 = 760;

        let mut figure = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));

        let lo = counts.iter().copied().min().unwrap_or(0) as f64;
        let hi = counts.iter().copied().max().unwrap_or(0) as f64;
        let span = (hi - lo).max(1.0);
        let (v_min, v_max) = (lo - span * 0.05, hi + span * 0.05);
        let to_y = |v: f64| -> i32 {
            BOTTOM - ((v - v_min) / (v_max - v_min) * (BOTTOM - TOP) as f64).round() as i32
        };

        {
            let buf: &mut [u8] = &mut figure;
            let root = BitMapBackend::with_buffer(buf, (WIDTH, HEIGHT)).into_drawing_area();

            let step = (span / 10.0).ceil().max(1.0);
            let mut tick = (v_min / step).ceil() * step;
            while tick <= v_max {
                let y = to_y(tick);
                root.draw(&PathElement::new(vec![(LEFT, y), (RIGHT, y)], GRID_COLOR))
                    .map_err(render_err)?;
                self.draw_caption(&root, &format!("{}", tick), (LEFT - 40, y - 8), 14)?;
                tick += step;
            }

            let center = (LEFT + RIGHT) / 2;
            let half_box = ((RIGHT - LEFT) as f64 * 0.15) as i32;
            let edge = RGBColor(60, 60, 60).stroke_width(2);

            root.draw(&Rectangle::new(
                [(center - half_box, to_y(stats.q3)), (center + half_box, to_y(stats.q1))],
                BOX_COLOR.filled(),
            ))
            .map_err(render_err)?;
            root.draw(&Rectangle::new(
                [(center - half_box, to_y(stats.q3)), (center + half_box, to_y(stats.q1))],
                edge,
            ))
            .map_err(render_err)?;
            root.draw(&PathElement::new(
                vec![
                    (center - half_box, to_y(stats.median)),
                    (center + half_box, to_y(stats.median)),
                ],
                edge,
            ))
            .map_err(render_err)?;

            let cap = half_box / 2;
            for (from, to) in [(stats.q3, stats.whisker_high), (stats.q1, stats.whisker_low)] {
                root.draw(&PathElement::new(
                    vec![(center, to_y(from)), (center, to_y(to))],
                    edge,
                ))
                .map_err(render_err)?;
                root.draw(&PathElement::new(
                    vec![(center - cap, to_y(to)), (center + cap, to_y(to))],
                    edge,
                ))
                .map_err(render_err)?;
            }

            for &outlier in &stats.outliers {
                root.draw(&Circle::new((center, to_y(outlier as f64)), 6, edge))
                    .map_err(render_err)?;
            }

            self.draw_caption(&root, "Distribution of Ring Counts", (LEFT, 30), 24)?;
            self.draw_caption(&root, "Ring Count", (10, TOP - 30), 16)?;
            root.present().map_err(render_err)?;
        }
        Ok(figure)
    }
}
