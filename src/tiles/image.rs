use crate::{Error, Result};

#[cfg(feature = "image")]
use crate::tiles::source::{ByteSource, TileFetcher};
#[cfg(feature = "image")]
use async_trait::async_trait;

/// Decoded tile payload: tightly packed RGBA8 pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct TileImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl TileImage {
    /// Wraps already decoded RGBA8 pixels
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::Decode(format!(
                "expected {} bytes for a {}x{} RGBA image, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A fully transparent image of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Decodes PNG/JPEG/... bytes with the `image` crate
    #[cfg(feature = "image")]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| Error::Decode(format!("Failed to load image: {}", e)))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            width,
            height,
            data: img.into_raw(),
        })
    }

    /// Gets the RGBA value of one pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for TileImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Fetcher that reads raw bytes from a [`ByteSource`] and decodes them.
#[cfg(feature = "image")]
#[derive(Debug, Clone)]
pub struct ImageFetcher<S> {
    source: S,
}

#[cfg(feature = "image")]
impl<S: ByteSource> ImageFetcher<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(feature = "image")]
#[async_trait(?Send)]
impl<S: ByteSource> TileFetcher for ImageFetcher<S> {
    async fn fetch(&self, descriptor: &str) -> Result<TileImage> {
        let bytes = self.source.fetch_bytes(descriptor).await?;
        TileImage::decode(&bytes)
    }
}
