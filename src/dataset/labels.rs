//! Ground-truth label image decoding

use crate::error::{Result, SegEvalError};
use crate::metrics::LabelMap;
use image::DynamicImage;
use ndarray::Array2;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::OnceLock;

/// Number of classes in the PascalVOC color palette (background + 20)
const VOC_CLASSES: u32 = 21;

/// How class indices are stored in a dataset's label images
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelDecoding {
    /// Single-channel images holding class indices directly
    Grayscale,
    /// Single-channel images where 0 is "unlabeled" and class `c` is stored as `c + 1`
    ReduceZero,
    /// PascalVOC color-palette images; single-channel and indexed images are
    /// read as indices, with the border index 255 mapped to the ignore index
    VocPalette,
}

impl LabelDecoding {
    /// Decode a label image into a label map
    ///
    /// # Errors
    /// - Color pixels in an image expected to be single-channel
    /// - Colors outside the VOC palette
    pub fn decode(self, image: &DynamicImage, ignore_index: u32) -> Result<LabelMap> {
        match (self, image) {
            (Self::VocPalette, DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_))
            | (Self::Grayscale | Self::ReduceZero, _) => {
                Ok(self.decode_indices(grayscale(image)?, ignore_index))
            },
            (Self::VocPalette, _) => voc_palette(image, ignore_index),
        }
    }

    /// Apply the encoding rules to raw stored indices
    #[must_use]
    pub fn decode_indices(self, indices: LabelMap, ignore_index: u32) -> LabelMap {
        match self {
            Self::Grayscale => indices,
            Self::ReduceZero => indices.mapv(|v| if v == 0 { ignore_index } else { v - 1 }),
            Self::VocPalette => indices.mapv(|v| if v == 255 { ignore_index } else { v }),
        }
    }
}

/// Read the stored indices of a palette (indexed-color) PNG
///
/// Image decoders expand palettes to RGB, which loses the class indices of
/// pseudo-color label files. Returns `None` for anything that is not an
/// indexed PNG so the caller can decode it normally.
///
/// # Errors
/// - File cannot be opened
/// - Pixel data of an indexed PNG is corrupt
pub fn read_palette_indices(path: &Path) -> Result<Option<LabelMap>> {
    let is_png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if !is_png {
        return Ok(None);
    }

    let file = File::open(path).map_err(|e| SegEvalError::file_io_error("open label", path, &e))?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::IDENTITY);

    // Unreadable headers are left to the regular decoder for its error message
    let Ok(mut reader) = decoder.read_info() else {
        return Ok(None);
    };
    if reader.info().color_type != png::ColorType::Indexed {
        return Ok(None);
    }

    let size = reader.output_buffer_size().ok_or_else(|| {
        SegEvalError::processing(format!("Label image '{}' is too large", path.display()))
    })?;
    let mut buffer = vec![0u8; size];
    let frame = reader.next_frame(&mut buffer).map_err(|e| {
        SegEvalError::processing(format!(
            "Failed to decode palette label '{}': {e}",
            path.display()
        ))
    })?;

    unpack_indices(&buffer, &frame).map(Some)
}

/// Expand packed 1/2/4/8-bit palette indices into a label map
fn unpack_indices(buffer: &[u8], frame: &png::OutputInfo) -> Result<LabelMap> {
    let (width, height) = (frame.width as usize, frame.height as usize);
    let bits = frame.bit_depth as usize;
    if !matches!(bits, 1 | 2 | 4 | 8) || frame.line_size == 0 {
        return Err(SegEvalError::processing(format!(
            "Unsupported palette bit depth {bits}"
        )));
    }
    let per_byte = 8 / bits;
    let mask = (1u16 << bits) - 1;

    let mut values = Vec::with_capacity(width * height);
    for row in buffer.chunks(frame.line_size).take(height) {
        for x in 0..width {
            let byte = row.get(x / per_byte).copied().ok_or_else(|| {
                SegEvalError::processing("Palette label row shorter than its width")
            })?;
            let shift = 8 - bits * (x % per_byte + 1);
            values.push(u32::from((u16::from(byte) >> shift) & mask));
        }
    }

    Array2::from_shape_vec((height, width), values)
        .map_err(|e| SegEvalError::processing(format!("Invalid label image layout: {e}")))
}

fn grayscale(image: &DynamicImage) -> Result<LabelMap> {
    let (width, height) = (image.width() as usize, image.height() as usize);

    let values: Vec<u32> = match image {
        DynamicImage::ImageLuma8(buf) => buf.as_raw().iter().map(|&v| u32::from(v)).collect(),
        DynamicImage::ImageLuma16(buf) => buf.as_raw().iter().map(|&v| u32::from(v)).collect(),
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLumaA16(_) => {
            image.to_luma16().as_raw().iter().map(|&v| u32::from(v)).collect()
        },
        other => {
            // Gray values stored in an RGB container
            let rgb = other.to_rgb8();
            let mut values = Vec::with_capacity(width * height);
            for pixel in rgb.pixels() {
                let [r, g, b] = pixel.0;
                if r != g || g != b {
                    return Err(SegEvalError::processing(format!(
                        "Label image holds color ({r}, {g}, {b}); expected single-channel class indices"
                    )));
                }
                values.push(u32::from(r));
            }
            values
        },
    };

    Array2::from_shape_vec((height, width), values)
        .map_err(|e| SegEvalError::processing(format!("Invalid label image layout: {e}")))
}

/// RGB color of each PascalVOC palette index
///
/// Index 255 maps to the light border color that marks ignored pixels.
#[must_use]
pub fn voc_colormap(index: u32) -> [u8; 3] {
    let mut color = [0u8; 3];
    let mut cid = index;
    for shift in (0..8).rev() {
        for (channel, value) in color.iter_mut().enumerate() {
            let bit = ((cid >> channel) & 1) as u8;
            *value |= bit << shift;
        }
        cid >>= 3;
    }
    color
}

fn voc_lookup() -> &'static HashMap<[u8; 3], u32> {
    static LOOKUP: OnceLock<HashMap<[u8; 3], u32>> = OnceLock::new();
    LOOKUP.get_or_init(|| {
        (0..VOC_CLASSES)
            .chain(std::iter::once(255))
            .map(|index| (voc_colormap(index), index))
            .collect()
    })
}

fn voc_palette(image: &DynamicImage, ignore_index: u32) -> Result<LabelMap> {
    let rgb = image.to_rgb8();
    let (width, height) = (rgb.width() as usize, rgb.height() as usize);
    let lookup = voc_lookup();

    let mut values = Vec::with_capacity(width * height);
    for pixel in rgb.pixels() {
        match lookup.get(&pixel.0) {
            Some(255) => values.push(ignore_index),
            Some(&index) => values.push(index),
            None => {
                let [r, g, b] = pixel.0;
                return Err(SegEvalError::processing(format!(
                    "Label color ({r}, {g}, {b}) is not part of the PascalVOC palette"
                )));
            },
        }
    }

    Array2::from_shape_vec((height, width), values)
        .map_err(|e| SegEvalError::processing(format!("Invalid label image layout: {e}")))
}
