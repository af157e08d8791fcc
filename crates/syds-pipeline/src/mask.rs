//! Boolean raster masks and region blanking.
//!
//! [`BinaryMask`] is the common currency between stages: the walkway
//! threshold, the thinned skeleton, and the stitched skeleton are all
//! masks of the same extent as the floor image. Stages never mutate a
//! mask they received; they clone and return a new one.
//!
//! [`blank_regions`] paints user-drawn region polygons black on a copy of
//! the floor image so that only walkway ink survives into skeletonization.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::drawing::{BresenhamLineIter, draw_polygon_mut};
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Point};

/// A 2D grid of booleans, stored row-major.
///
/// Serializes as `{ "width", "height", "rows" }` where `rows` holds one
/// array of `0`/`1` per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

/// A [`BinaryMask`] whose true cells form one-pixel-wide curves.
pub type Skeleton = BinaryMask;

impl BinaryMask {
    /// An all-false mask.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every cell.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut cells = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    /// Treat every non-zero pixel of a grayscale image as set.
    #[must_use]
    pub fn from_gray(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            cells: image.pixels().map(|p| p.0[0] != 0).collect(),
        }
    }

    /// Render as a grayscale image: set cells are 255, others 0.
    #[must_use]
    pub fn to_gray(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.cells[self.index(x, y)] { 255 } else { 0 }])
        })
    }

    /// Mask width in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Mask height in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Mask extent.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// `true` if `p` lies inside the mask extent.
    #[must_use]
    pub fn contains(&self, p: Point) -> bool {
        u32::try_from(p.x).is_ok_and(|x| x < self.width)
            && u32::try_from(p.y).is_ok_and(|y| y < self.height)
    }

    /// Cell value at `p`; `false` outside the mask.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn get(&self, p: Point) -> bool {
        self.contains(p) && self.cells[self.index(p.x as u32, p.y as u32)]
    }

    /// Set the cell at `p`. Points outside the mask are ignored.
    #[allow(clippy::cast_sign_loss)]
    pub fn set(&mut self, p: Point, value: bool) {
        if self.contains(p) {
            let idx = self.index(p.x as u32, p.y as u32);
            self.cells[idx] = value;
        }
    }

    /// Number of set cells.
    #[must_use]
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Iterate over the coordinates of set cells in row-major order.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn set_points(&self) -> impl Iterator<Item = Point> + '_ {
        let width = self.width as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c)
            .map(move |(i, _)| Point::new((i % width) as i32, (i / width) as i32))
    }

    /// Rasterize the segment `from`-`to` (both endpoints included),
    /// setting every covered cell. Cells outside the mask are clipped.
    #[allow(clippy::cast_precision_loss)]
    pub fn draw_line(&mut self, from: Point, to: Point) {
        let start = (from.x as f32, from.y as f32);
        let end = (to.x as f32, to.y as f32);
        for (x, y) in BresenhamLineIter::new(start, end) {
            self.set(Point::new(x, y), true);
        }
    }

    /// Raw row-major cell slice.
    #[must_use]
    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

#[derive(Serialize, Deserialize)]
struct BinaryMaskProxy {
    width: u32,
    height: u32,
    rows: Vec<Vec<u8>>,
}

impl Serialize for BinaryMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows = if self.width == 0 {
            vec![Vec::new(); self.height as usize]
        } else {
            self.cells
                .chunks(self.width as usize)
                .map(|row| row.iter().map(|&c| u8::from(c)).collect())
                .collect()
        };
        BinaryMaskProxy {
            width: self.width,
            height: self.height,
            rows,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BinaryMask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = BinaryMaskProxy::deserialize(deserializer)?;
        if proxy.rows.len() != proxy.height as usize {
            return Err(serde::de::Error::custom(format!(
                "mask declares height {} but has {} rows",
                proxy.height,
                proxy.rows.len(),
            )));
        }
        let mut cells = Vec::with_capacity(proxy.width as usize * proxy.height as usize);
        for (y, row) in proxy.rows.iter().enumerate() {
            if row.len() != proxy.width as usize {
                return Err(serde::de::Error::custom(format!(
                    "mask row {y} has {} cells, expected {}",
                    row.len(),
                    proxy.width,
                )));
            }
            cells.extend(row.iter().map(|&v| v != 0));
        }
        Ok(Self {
            width: proxy.width,
            height: proxy.height,
            cells,
        })
    }
}

/// Fill each region polygon with opaque black on a copy of `image`.
///
/// Polygons may be given closed (first point repeated at the end) or
/// open. Polygons with fewer than three distinct points are ignored.
#[must_use = "returns the image with regions blanked"]
pub fn blank_regions<'a>(
    image: &RgbaImage,
    polygons: impl IntoIterator<Item = &'a [Point]>,
) -> RgbaImage {
    let mut out = image.clone();
    let black = Rgba([0, 0, 0, 255]);
    for ring in polygons.into_iter().filter_map(drawable_ring) {
        draw_polygon_mut(&mut out, &ring, black);
    }
    out
}

/// Mask of the pixels inside (or on) `polygon`.
///
/// Same polygon conventions as [`blank_regions`]; a degenerate polygon
/// yields an empty mask.
#[must_use = "returns the polygon mask"]
pub fn polygon_mask(width: u32, height: u32, polygon: &[Point]) -> BinaryMask {
    let mut gray = GrayImage::new(width, height);
    if let Some(ring) = drawable_ring(polygon) {
        draw_polygon_mut(&mut gray, &ring, Luma([255]));
    }
    BinaryMask::from_gray(&gray)
}

/// Open ring of distinct consecutive points, or `None` below three.
fn drawable_ring(polygon: &[Point]) -> Option<Vec<imageproc::point::Point<i32>>> {
    let mut ring: Vec<imageproc::point::Point<i32>> = polygon
        .iter()
        .map(|p| imageproc::point::Point::new(p.x, p.y))
        .collect();
    ring.dedup();
    // The closing edge is implicit; a repeated endpoint would panic.
    while ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    (ring.len() >= 3).then_some(ring)
}
