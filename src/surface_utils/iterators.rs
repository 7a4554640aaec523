//! Row-major pixel iteration over a `SharedImageSurface`.

use crate::rect::IRect;

use super::shared_surface::SharedImageSurface;
use super::Pixel;

/// Yields `(x, y, pixel)` for every pixel of a region, row by row.
///
/// Coordinates are relative to the surface, so a subset starts at `(0, 0)`.
#[derive(Debug, Clone, Copy)]
pub struct Pixels<'a> {
    surface: &'a SharedImageSurface,
    region: IRect,
    next: usize,
    len: usize,
}

impl<'a> Pixels<'a> {
    #[inline]
    pub fn new(surface: &'a SharedImageSurface) -> Self {
        Self::within(surface, surface.bounds())
    }

    /// Iterates over `region ∩ surface.bounds()`.
    #[inline]
    pub fn within(surface: &'a SharedImageSurface, region: IRect) -> Self {
        let region = region
            .intersection(&surface.bounds())
            .unwrap_or_default();

        let len = if region.is_empty() {
            0
        } else {
            region.width() as usize * region.height() as usize
        };

        Self {
            surface,
            region,
            next: 0,
            len,
        }
    }
}

impl<'a> Iterator for Pixels<'a> {
    type Item = (u32, u32, Pixel);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.next == self.len {
            return None;
        }

        let w = self.region.width() as usize;
        let x = (self.region.x0 as usize + self.next % w) as u32;
        let y = (self.region.y0 as usize + self.next / w) as u32;
        self.next += 1;

        Some((x, y, self.surface.get_pixel(x, y)))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.len - self.next;
        (left, Some(left))
    }
}

impl<'a> ExactSizeIterator for Pixels<'a> {}
