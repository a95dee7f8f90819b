/// Grayscale pixel grid fed to the bitmap encoders, row-major, one byte per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    luma: Vec<u8>,
}

/// Pixels darker than this print as dots
pub const BLACK_THRESHOLD: u8 = 128;

impl Raster {
    /// Returns `None` when `luma` does not hold exactly `width * height` pixels
    pub fn from_luma(width: usize, height: usize, luma: Vec<u8>) -> Option<Self> {
        (luma.len() == width * height).then_some(Self {
            width,
            height,
            luma,
        })
    }

    pub fn from_fn(width: usize, height: usize, pixel: impl Fn(usize, usize) -> u8) -> Self {
        let mut luma = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                luma.push(pixel(x, y));
            }
        }
        Self {
            width,
            height,
            luma,
        }
    }

    /// Gray is the plain channel average, `(r + g + b) / 3`
    #[cfg(feature = "image")]
    pub fn from_image(image: &image::DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        let luma = rgb
            .pixels()
            .map(|p| ((p.0[0] as u16 + p.0[1] as u16 + p.0[2] as u16) / 3) as u8)
            .collect();
        Self {
            width,
            height,
            luma,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn luma(&self, x: usize, y: usize) -> u8 {
        self.luma[y * self.width + x]
    }

    /// Out-of-range coordinates read as white
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.luma(x, y) < BLACK_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_luma_checks_length() {
        assert!(Raster::from_luma(2, 2, vec![0; 3]).is_none());
        assert!(Raster::from_luma(2, 2, vec![0; 4]).is_some());
    }

    #[test]
    fn test_threshold() {
        let raster = Raster::from_luma(3, 1, vec![127, 128, 0]).unwrap();
        assert!(raster.is_dark(0, 0));
        assert!(!raster.is_dark(1, 0));
        assert!(raster.is_dark(2, 0));
        assert!(!raster.is_dark(5, 0));
    }
}
