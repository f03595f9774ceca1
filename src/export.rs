use crate::error::StitchError;
use crate::strip::Strip;
use image::codecs::jpeg::JpegEncoder;
use lopdf::{Document as LoDocument, Object as LoObject, Stream as LoStream, dictionary};
use std::path::Path;

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub jpeg_quality: u8,
    pub dpi: u32,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: crate::config::DEFAULT_JPEG_QUALITY,
            dpi: crate::config::DEFAULT_DPI,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub pages_written: usize,
    pub bytes_written: usize,
}

/// Pixel length to PDF points at `dpi`. Never collapses to zero.
fn px_to_pt(px: u32, dpi: u32) -> i64 {
    let pt = (px as f64 * 72.0 / dpi.max(1) as f64).round() as i64;
    pt.max(1)
}

fn encode_jpeg(strip: &Strip, quality: u8) -> Result<Vec<u8>, StitchError> {
    let mut bytes = Vec::new();
    strip
        .pixels()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
        .map_err(|err| {
            StitchError::Export(format!(
                "cannot encode {}x{} strip from chapter {} as jpeg: {}",
                strip.width(),
                strip.height(),
                strip.chapter(),
                err
            ))
        })?;
    Ok(bytes)
}

/// Builds the document in memory: one page per strip, in slice order.
pub fn build_document(strips: &[Strip], options: &ExportOptions) -> Result<LoDocument, StitchError> {
    if strips.is_empty() {
        return Err(StitchError::Export("no strips to write".to_string()));
    }

    let mut doc = LoDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<LoObject> = Vec::with_capacity(strips.len());

    for strip in strips {
        let jpeg = encode_jpeg(strip, options.jpeg_quality)?;
        let image_stream = LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => strip.width() as i64,
                "Height" => strip.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        )
        .with_compression(false);
        let image_id = doc.add_object(image_stream);

        let page_w = px_to_pt(strip.width(), options.dpi);
        let page_h = px_to_pt(strip.height(), options.dpi);
        let content = format!("q {page_w} 0 0 {page_h} 0 0 cm /Im0 Do Q\n").into_bytes();
        let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), page_w.into(), page_h.into()],
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
    };
    doc.objects.insert(pages_id, LoObject::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    Ok(doc)
}

/// Writes `strips` to `path` as a single PDF, creating parent directories.
pub fn write_document(
    strips: &[Strip],
    path: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, StitchError> {
    let mut doc = build_document(strips, options)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|err| StitchError::Export(format!("{}: {}", parent.display(), err)))?;
    }
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| StitchError::Export(format!("cannot serialize pdf: {err}")))?;
    std::fs::write(path, &bytes)
        .map_err(|err| StitchError::Export(format!("{}: {}", path.display(), err)))?;
    Ok(ExportSummary {
        pages_written: strips.len(),
        bytes_written: bytes.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strip::build_strips;
    use image::{Rgb, RgbImage};

    fn strips_of(heights: &[u32], max_height: u32) -> Vec<Strip> {
        let images: Vec<RgbImage> = heights
            .iter()
            .map(|h| RgbImage::from_pixel(20, *h, Rgb([200, 40, 10])))
            .collect();
        build_strips(1, &images, max_height).unwrap()
    }

    fn media_boxes(doc: &LoDocument) -> Vec<(i64, i64)> {
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_object(*id).and_then(LoObject::as_dict).unwrap();
                let mb = page.get(b"MediaBox").and_then(LoObject::as_array).unwrap();
                (mb[2].as_i64().unwrap(), mb[3].as_i64().unwrap())
            })
            .collect()
    }

    #[test]
    fn empty_strip_list_is_export_error() {
        let err = build_document(&[], &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, StitchError::Export(_)));
    }

    #[test]
    fn one_page_per_strip_in_order() {
        let strips = strips_of(&[30, 40, 10], 65);
        let heights: Vec<u32> = strips.iter().map(Strip::height).collect();
        assert_eq!(heights, vec![30, 50]);

        let doc = build_document(&strips, &ExportOptions::default()).unwrap();
        assert_eq!(media_boxes(&doc), vec![(20, 30), (20, 50)]);
    }

    #[test]
    fn dpi_scales_page_size() {
        let strips = strips_of(&[144], 1000);
        let doc = build_document(
            &strips,
            &ExportOptions {
                jpeg_quality: 80,
                dpi: 144,
            },
        )
        .unwrap();
        assert_eq!(media_boxes(&doc), vec![(10, 72)]);
    }

    #[test]
    fn written_file_reloads_with_all_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("Test_MASTER.pdf");
        let strips = strips_of(&[25, 25, 25, 25, 25], 50);
        let summary = write_document(&strips, &path, &ExportOptions::default()).unwrap();
        assert_eq!(summary.pages_written, 3);
        assert_eq!(
            summary.bytes_written as u64,
            std::fs::metadata(&path).unwrap().len()
        );

        let doc = LoDocument::load(&path).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert_eq!(media_boxes(&doc), vec![(20, 50), (20, 50), (20, 25)]);
    }

    #[test]
    fn strip_taller_than_jpeg_limit_fails_export() {
        let tall = RgbImage::new(1, 70_000);
        let strips = build_strips(9, &[tall], 65_500).unwrap();
        let err = build_document(&strips, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, StitchError::Export(ref msg) if msg.contains("chapter 9")));
    }
}
