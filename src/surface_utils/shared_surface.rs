//! Shared access to image surfaces.
//!
//! Pixels are written into an [`ExclusiveImageSurface`], which has a single owner.  Once
//! drawing is finished, [`ExclusiveImageSurface::share`] turns it into a
//! [`SharedImageSurface`]: an immutable, reference-counted image that can be cloned freely,
//! cached, and cut into zero-copy subsets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::color::{Color, ColorSpace, ColorType};
use crate::error::{ImplementationLimit, SurfaceError};
use crate::limits::MAX_SURFACE_DIMENSION;
use crate::point::{IPoint, ISize, Point};
use crate::rect::IRect;
use crate::shader::ShaderEval;

use super::iterators::Pixels;
use super::{Pixel, PixelOps};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_image_id() -> u64 {
    NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// How a drawn color is combined with what is already in the surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DrawMode {
    /// Replace the destination.
    Src,
    /// Composite over the destination.
    SrcOver,
}

#[derive(Debug)]
struct ImageData {
    pixels: Box<[Pixel]>,
    width: i32,
    height: i32,
    id: u64,
}

/// An immutable image, possibly a view into a larger pixel buffer.
///
/// Cloning is cheap; all clones and all subsets share the same pixels.
#[derive(Debug, Clone)]
pub struct SharedImageSurface {
    data: Arc<ImageData>,

    /// The part of `data` that this image covers, in buffer coordinates.
    subset: IRect,

    color_type: ColorType,
    color_space: Option<ColorSpace>,
    texture_backed: bool,
}

impl SharedImageSurface {
    /// Wraps premultiplied pixels in row-major order.
    pub fn from_pixels(
        width: i32,
        height: i32,
        pixels: Vec<Pixel>,
        color_type: ColorType,
        color_space: Option<ColorSpace>,
    ) -> Result<SharedImageSurface, SurfaceError> {
        check_size(width, height)?;

        if pixels.len() != (width as usize) * (height as usize) {
            return Err(SurfaceError::InvalidSize { width, height });
        }

        let mut surface = ExclusiveImageSurface {
            pixels,
            width,
            height,
            color_type,
            color_space,
            texture_backed: false,
        };

        if color_type == ColorType::Alpha8 {
            for p in surface.pixels.iter_mut() {
                *p = color_type.restrict(*p);
            }
        }

        Ok(surface.share())
    }

    /// Returns the surface width.
    #[inline]
    pub fn width(&self) -> i32 {
        self.subset.width()
    }

    /// Returns the surface height.
    #[inline]
    pub fn height(&self) -> i32 {
        self.subset.height()
    }

    #[inline]
    pub fn size(&self) -> ISize {
        ISize::new(self.width(), self.height())
    }

    /// The rectangle `(0, 0, width, height)`.
    #[inline]
    pub fn bounds(&self) -> IRect {
        IRect::from_size(self.width(), self.height())
    }

    #[inline]
    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    #[inline]
    pub fn color_space(&self) -> Option<ColorSpace> {
        self.color_space
    }

    #[inline]
    pub fn is_texture_backed(&self) -> bool {
        self.texture_backed
    }

    /// Identifies the backing pixel buffer; shared by all subsets of one buffer.
    #[inline]
    pub fn unique_id(&self) -> u64 {
        self.data.id
    }

    /// The area of the backing buffer covered by this image.
    #[inline]
    pub fn subset_rect(&self) -> IRect {
        self.subset
    }

    /// Whether both images are views of the same pixel buffer.
    #[inline]
    pub fn shares_pixels_with(&self, other: &SharedImageSurface) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Retrieves the pixel value at the given coordinates.
    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        assert!(x < self.width() as u32);
        assert!(y < self.height() as u32);

        let bx = self.subset.x0 as usize + x as usize;
        let by = self.subset.y0 as usize + y as usize;

        self.data.pixels[by * self.data.width as usize + bx]
    }

    /// Like `get_pixel()`, but returns transparent black outside of the image.
    #[inline]
    pub fn get_pixel_or_transparent(&self, x: i32, y: i32) -> Pixel {
        if x < 0 || y < 0 || x >= self.width() || y >= self.height() {
            Pixel::default()
        } else {
            self.get_pixel(x as u32, y as u32)
        }
    }

    /// A view of `rect` (in this image's coordinates), clamped to the image.
    ///
    /// The returned image shares pixels with `self`.  Returns `None` if nothing is left
    /// after clamping.
    pub fn make_subset(&self, rect: IRect) -> Option<SharedImageSurface> {
        let rect = rect.intersection(&self.bounds())?;

        Some(SharedImageSurface {
            data: self.data.clone(),
            subset: rect.translate((self.subset.x0, self.subset.y0)),
            color_type: self.color_type,
            color_space: self.color_space,
            texture_backed: self.texture_backed,
        })
    }

    #[inline]
    pub fn pixels(&self) -> Pixels<'_> {
        Pixels::new(self)
    }

    /// Whether all pixels are transparent black.
    pub fn is_transparent(&self) -> bool {
        self.pixels().all(|(_, _, p)| p.is_transparent())
    }
}

fn check_size(width: i32, height: i32) -> Result<(), SurfaceError> {
    if width <= 0 || height <= 0 {
        return Err(SurfaceError::InvalidSize { width, height });
    }

    if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
        return Err(SurfaceError::LimitExceeded(
            ImplementationLimit::SurfaceTooLarge,
        ));
    }

    Ok(())
}

/// Allocates `len` transparent pixels, or `None` if the allocator refuses.
fn transparent_pixels(len: usize) -> Option<Vec<Pixel>> {
    let mut pixels = Vec::new();
    pixels.try_reserve_exact(len).ok()?;
    pixels.resize(len, Pixel::default());
    Some(pixels)
}

/// A surface with exclusive access to its pixels; starts out transparent.
#[derive(Debug)]
pub struct ExclusiveImageSurface {
    pixels: Vec<Pixel>,
    width: i32,
    height: i32,
    color_type: ColorType,
    color_space: Option<ColorSpace>,
    texture_backed: bool,
}

impl ExclusiveImageSurface {
    pub fn new(
        width: i32,
        height: i32,
        color_type: ColorType,
        color_space: Option<ColorSpace>,
    ) -> Result<ExclusiveImageSurface, SurfaceError> {
        check_size(width, height)?;

        let pixels = transparent_pixels(width as usize * height as usize)
            .ok_or(SurfaceError::OutOfMemory { width, height })?;

        Ok(ExclusiveImageSurface {
            pixels,
            width,
            height,
            color_type,
            color_space,
            texture_backed: false,
        })
    }

    /// Marks the surface as living on a device; only recorded, never acted upon.
    #[inline]
    pub fn set_texture_backed(&mut self, texture_backed: bool) {
        self.texture_backed = texture_backed;
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    #[inline]
    pub fn color_space(&self) -> Option<ColorSpace> {
        self.color_space
    }

    #[inline]
    pub fn get_pixel(&self, x: u32, y: u32) -> Pixel {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        let i = y as usize * self.width as usize + x as usize;
        self.pixels[i] = self.color_type.restrict(pixel);
    }

    /// Evaluates `shader` at the center of every pixel and writes the result.
    ///
    /// Pixel `(x, y)` of the surface corresponds to the shader coordinate
    /// `origin + (x + 0.5, y + 0.5)`.  Only pixels inside `clip` (in surface coordinates)
    /// are touched.  Rows are processed in parallel.
    pub fn draw(
        &mut self,
        shader: &dyn ShaderEval,
        origin: IPoint,
        clip: Option<IRect>,
        mode: DrawMode,
    ) {
        let surface_bounds = IRect::from_size(self.width, self.height);
        let area = match clip {
            Some(c) => match c.intersection(&surface_bounds) {
                Some(a) => a,
                None => return,
            },
            None => surface_bounds,
        };

        let width = self.width as usize;
        let color_type = self.color_type;

        self.pixels
            .par_chunks_mut(width)
            .enumerate()
            .skip(area.y0 as usize)
            .take(area.height() as usize)
            .for_each(|(y, row)| {
                let py = f64::from(origin.y) + y as f64 + 0.5;

                for x in area.x0..area.x1 {
                    let p = Point::new(f64::from(origin.x) + f64::from(x) + 0.5, py);
                    let src = shader.eval(p).clamp_premultiplied();
                    let out = &mut row[x as usize];

                    let color = match mode {
                        DrawMode::Src => src,
                        DrawMode::SrcOver => {
                            let dst = Color::from_pixel(*out);
                            src + dst.scale(1.0 - src.a)
                        }
                    };

                    *out = color_type.restrict(color.to_pixel());
                }
            });
    }

    /// Freezes the surface into an immutable image.
    pub fn share(self) -> SharedImageSurface {
        let subset = IRect::from_size(self.width, self.height);

        SharedImageSurface {
            data: Arc::new(ImageData {
                pixels: self.pixels.into_boxed_slice(),
                width: self.width,
                height: self.height,
                id: next_image_id(),
            }),
            subset,
            color_type: self.color_type,
            color_space: self.color_space,
            texture_backed: self.texture_backed,
        }
    }
}
