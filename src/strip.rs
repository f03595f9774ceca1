use crate::error::StitchError;
use image::{RgbImage, imageops};
use std::ops::Range;
use tracing::warn;

/// A finished strip: one output page cut from a run of consecutive images.
#[derive(Debug, Clone)]
pub struct Strip {
    chapter: u32,
    image_count: usize,
    pixels: RgbImage,
}

impl Strip {
    pub fn chapter(&self) -> u32 {
        self.chapter
    }

    pub fn image_count(&self) -> usize {
        self.image_count
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Which input images share a strip, and how tall that strip ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StripPlan {
    pub images: Range<usize>,
    pub height: u32,
}

/// Splits a run of image heights into strips without exceeding `max_height`.
///
/// A new strip starts whenever the next image would overflow the current one.
/// An image taller than `max_height` still gets a strip of its own; it is never
/// split and never preceded by an empty strip.
pub fn plan_strips(heights: &[u32], max_height: u32) -> Vec<StripPlan> {
    let mut plans = Vec::new();
    let mut start = 0usize;
    let mut offset: u64 = 0;
    for (idx, &height) in heights.iter().enumerate() {
        if offset > 0 && offset + height as u64 > max_height as u64 {
            plans.push(StripPlan {
                images: start..idx,
                height: offset as u32,
            });
            start = idx;
            offset = 0;
        }
        offset += height as u64;
    }
    if start < heights.len() {
        plans.push(StripPlan {
            images: start..heights.len(),
            height: offset as u32,
        });
    }
    plans
}

/// Mutable canvas that images are pasted onto top to bottom.
pub struct StripCanvas {
    buffer: RgbImage,
    offset: u32,
    pasted: usize,
}

impl StripCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: RgbImage::new(width, height),
            offset: 0,
            pasted: 0,
        }
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Pastes `image` at the running offset, left aligned. Pixels outside the
    /// canvas are clipped.
    pub fn paste(&mut self, image: &RgbImage) {
        imageops::replace(&mut self.buffer, image, 0, self.offset as i64);
        self.offset = self.offset.saturating_add(image.height());
        self.pasted += 1;
    }

    /// Crops the canvas to the filled height.
    pub fn finish(self, chapter: u32) -> Strip {
        let (width, height) = self.buffer.dimensions();
        let filled = self.offset.min(height);
        let pixels = if filled == height {
            self.buffer
        } else {
            imageops::crop_imm(&self.buffer, 0, 0, width, filled).to_image()
        };
        Strip {
            chapter,
            image_count: self.pasted,
            pixels,
        }
    }
}

/// Stitches one chapter's images into strips no taller than `max_height`.
pub fn build_strips(
    chapter: u32,
    images: &[RgbImage],
    max_height: u32,
) -> Result<Vec<Strip>, StitchError> {
    let Some(first) = images.first() else {
        return Err(StitchError::EmptyInput { chapter });
    };
    let width = first.width();
    for (idx, image) in images.iter().enumerate() {
        if image.width() != width {
            warn!(
                chapter,
                image = idx,
                expected = width,
                actual = image.width(),
                "image width differs from the first image; pasting clipped to strip width"
            );
        }
    }

    let heights: Vec<u32> = images.iter().map(|img| img.height()).collect();
    let plans = plan_strips(&heights, max_height);
    let mut strips = Vec::with_capacity(plans.len());
    for plan in plans {
        let mut canvas = StripCanvas::new(width, plan.height);
        for image in &images[plan.images.clone()] {
            canvas.paste(image);
        }
        strips.push(canvas.finish(chapter));
    }
    Ok(strips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(width: u32, height: u32, shade: u8) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([shade, shade / 2, 255 - shade]))
    }

    // Each row carries its global row number so concatenation can be checked exactly.
    fn striped(width: u32, height: u32, first_row: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let row = first_row + y;
            Rgb([(row & 0xff) as u8, ((row >> 8) & 0xff) as u8, (x & 0xff) as u8])
        })
    }

    fn vconcat(images: &[RgbImage]) -> Vec<u8> {
        images.iter().flat_map(|img| img.as_raw().iter().copied()).collect()
    }

    #[test]
    fn plan_splits_when_next_image_overflows() {
        let plans = plan_strips(&[30_000, 40_000], 65_500);
        assert_eq!(
            plans,
            vec![
                StripPlan {
                    images: 0..1,
                    height: 30_000
                },
                StripPlan {
                    images: 1..2,
                    height: 40_000
                },
            ]
        );
    }

    #[test]
    fn plan_packs_images_that_fit_exactly() {
        let plans = plan_strips(&[10, 20, 30, 60], 60);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].images, 0..3);
        assert_eq!(plans[0].height, 60);
        assert_eq!(plans[1].images, 3..4);
    }

    #[test]
    fn plan_isolates_oversized_image_without_empty_strip() {
        let plans = plan_strips(&[200, 10, 10], 100);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].images, 0..1);
        assert_eq!(plans[0].height, 200);
        assert_eq!(plans[1].height, 20);

        let plans = plan_strips(&[10, 200, 10], 100);
        let heights: Vec<u32> = plans.iter().map(|p| p.height).collect();
        assert_eq!(heights, vec![10, 200, 10]);
    }

    #[test]
    fn plan_of_empty_input_is_empty() {
        assert!(plan_strips(&[], 100).is_empty());
    }

    #[test]
    fn plan_heights_sum_and_respect_bound() {
        let cases: &[(&[u32], u32)] = &[
            (&[1, 2, 3, 4, 5, 6, 7, 8, 9], 10),
            (&[50, 50, 50, 50], 100),
            (&[99, 2, 99, 2], 100),
            (&[7; 31], 20),
            (&[1], 1),
        ];
        for (heights, max) in cases {
            let plans = plan_strips(heights, *max);
            let total: u64 = heights.iter().map(|h| *h as u64).sum();
            let planned: u64 = plans.iter().map(|p| p.height as u64).sum();
            assert_eq!(planned, total);
            assert!(plans.len() as u64 >= total.div_ceil(*max as u64));
            assert!(plans.iter().all(|p| p.height <= *max));
            let covered: Vec<usize> = plans.iter().flat_map(|p| p.images.clone()).collect();
            assert_eq!(covered, (0..heights.len()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn build_rejects_empty_chapter() {
        let err = build_strips(7, &[], 100).unwrap_err();
        assert!(matches!(err, StitchError::EmptyInput { chapter: 7 }));
    }

    #[test]
    fn single_small_image_yields_single_strip() {
        let strips = build_strips(1, &[solid(16, 40, 10)], 65_500).unwrap();
        assert_eq!(strips.len(), 1);
        assert_eq!(strips[0].height(), 40);
        assert_eq!(strips[0].width(), 16);
        assert_eq!(strips[0].image_count(), 1);
        assert_eq!(strips[0].chapter(), 1);
    }

    #[test]
    fn strips_reproduce_vertical_concatenation() {
        let heights = [13u32, 7, 22, 5, 30, 1, 18];
        let mut row = 0;
        let images: Vec<RgbImage> = heights
            .iter()
            .map(|h| {
                let img = striped(9, *h, row);
                row += h;
                img
            })
            .collect();

        let strips = build_strips(3, &images, 32).unwrap();
        let stitched: Vec<RgbImage> = strips.iter().map(|s| s.pixels().clone()).collect();
        assert_eq!(vconcat(&stitched), vconcat(&images));
        assert!(strips.iter().all(|s| s.height() <= 32));
        let total: u32 = strips.iter().map(Strip::height).sum();
        assert_eq!(total, heights.iter().sum::<u32>());
        let counted: usize = strips.iter().map(Strip::image_count).sum();
        assert_eq!(counted, images.len());
    }

    #[test]
    fn oversized_image_keeps_full_height() {
        let images = vec![solid(4, 10, 1), striped(4, 150, 0), solid(4, 10, 2)];
        let strips = build_strips(2, &images, 100).unwrap();
        let heights: Vec<u32> = strips.iter().map(Strip::height).collect();
        assert_eq!(heights, vec![10, 150, 10]);
        assert_eq!(strips[1].pixels(), &images[1]);
    }

    #[test]
    fn narrower_image_is_padded_and_wider_is_clipped() {
        let images = vec![solid(8, 4, 100), solid(4, 4, 200), solid(12, 4, 50)];
        let strips = build_strips(1, &images, 100).unwrap();
        assert_eq!(strips.len(), 1);
        let strip = strips[0].pixels();
        assert_eq!(strip.dimensions(), (8, 12));
        assert_eq!(strip.get_pixel(2, 5), images[1].get_pixel(2, 1));
        assert_eq!(strip.get_pixel(6, 5), &Rgb([0, 0, 0]));
        assert_eq!(strip.get_pixel(7, 10), images[2].get_pixel(7, 2));
    }

    #[test]
    fn canvas_finish_crops_to_filled_height() {
        let mut canvas = StripCanvas::new(5, 50);
        canvas.paste(&solid(5, 12, 9));
        canvas.paste(&solid(5, 8, 90));
        assert_eq!(canvas.offset(), 20);
        let strip = canvas.finish(4);
        assert_eq!(strip.height(), 20);
        assert_eq!(strip.image_count(), 2);
        assert_eq!(strip.pixels().get_pixel(0, 15), &Rgb([90, 45, 165]));
    }
}
