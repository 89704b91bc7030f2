use image::{imageops, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{self, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::point::Point;

use super::result::{BoundingBox, DetectedRegion};
use crate::frame::{BinaryMask, DiffMap};

pub use imageproc::contours::Contour;
pub use imageproc::geometry::contour_area;

/// Set pixels whose difference exceeds `sensitivity` to 255, all others to 0.
pub fn threshold(diff: &DiffMap, sensitivity: u8) -> BinaryMask {
    BinaryMask::from_image(contrast::threshold(
        diff.as_image(),
        sensitivity,
        ThresholdType::Binary,
    ))
}

/// Grow set regions by `iterations` passes of a 3x3 square element.
///
/// Repeated 3x3 dilation is the same as a single L-infinity dilation of
/// radius `iterations`.
pub fn dilate(mask: &BinaryMask, iterations: u8) -> BinaryMask {
    if iterations == 0 {
        return mask.clone();
    }
    BinaryMask::from_image(morphology::dilate(mask.as_image(), Norm::LInf, iterations))
}

/// Outermost outer boundaries of the set regions. Holes and anything nested
/// inside a hole are skipped.
///
/// Regions touching column 0 are misclassified by the border follower, so
/// the mask is traced inside a one pixel zero frame and the points shifted
/// back.
pub fn extract_regions(mask: &BinaryMask) -> Vec<Contour<i32>> {
    let (width, height) = mask.dimensions();
    let mut padded = GrayImage::new(width + 2, height + 2);
    imageops::replace(&mut padded, mask.as_image(), 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|mut c| {
            for point in c.points.iter_mut() {
                *point = Point::new(point.x - 1, point.y - 1);
            }
            c
        })
        .collect()
}

/// Drop contours enclosing less than `min_area` and bound the rest.
pub fn filter_and_bound(contours: Vec<Contour<i32>>, min_area: f64) -> Vec<DetectedRegion> {
    contours
        .into_iter()
        .filter_map(|contour| {
            let area = contour_area(&contour.points);
            if area < min_area {
                return None;
            }
            let bounds = BoundingBox::enclosing(&contour.points)?;
            Some(DetectedRegion {
                bounds,
                area,
                contour: contour.points,
            })
        })
        .collect()
}
