use image::{GrayImage, Luma};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;

use crate::detection::model::{Prediction, Vertex};

pub const MASK_ON: u8 = 255;

/// Rasterizes every polygon into a fresh `width x height` mask. Pixels inside
/// or on the boundary of any polygon are set to `fill`; overlaps union.
pub fn polygon_mask<'a, I>(width: u32, height: u32, polygons: I, fill: u8) -> GrayImage
where
    I: IntoIterator<Item = &'a [Vertex]>,
{
    let mut mask = GrayImage::new(width, height);
    for polygon in polygons {
        fill_polygon(&mut mask, polygon, fill);
    }
    mask
}

/// Mask over the polygon predictions in `predictions`; point predictions have
/// no area and are skipped.
pub fn prediction_mask(width: u32, height: u32, predictions: &[Prediction], fill: u8) -> GrayImage {
    polygon_mask(
        width,
        height,
        predictions.iter().filter_map(Prediction::polygon),
        fill,
    )
}

fn fill_polygon(mask: &mut GrayImage, polygon: &[Vertex], fill: u8) {
    let mut points: Vec<Point<i32>> = polygon
        .iter()
        .map(|v| {
            let (x, y) = v.to_pixel();
            Point::new(x, y)
        })
        .collect();
    points.dedup();
    // the rasterizer rejects explicitly closed rings
    while points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    match points.as_slice() {
        [] => {}
        [p] => {
            if p.x >= 0 && p.y >= 0 && (p.x as u32) < mask.width() && (p.y as u32) < mask.height() {
                mask.put_pixel(p.x as u32, p.y as u32, Luma([fill]));
            }
        }
        _ => draw_polygon_mut(mask, &points, Luma([fill])),
    }
}

pub fn count_nonzero(mask: &GrayImage) -> u64 {
    mask.pixels().filter(|p| p[0] > 0).count() as u64
}
