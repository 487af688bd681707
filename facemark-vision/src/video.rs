use anyhow::{Context, Result};
use image::RgbImage;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

use crate::source::FrameSource;

/// Capture layouts the camera can be negotiated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb3,
    Yuyv,
    Grey,
}

impl PixelFormat {
    /// Negotiation order, best first.
    const PREFERRED: [PixelFormat; 3] =
        [PixelFormat::Rgb3, PixelFormat::Yuyv, PixelFormat::Grey];

    pub fn fourcc(self) -> FourCC {
        match self {
            PixelFormat::Rgb3 => FourCC::new(b"RGB3"),
            PixelFormat::Yuyv => FourCC::new(b"YUYV"),
            PixelFormat::Grey => FourCC::new(b"GREY"),
        }
    }

    pub fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        Self::PREFERRED.into_iter().find(|f| f.fourcc() == fourcc)
    }

    /// Bytes the driver delivers for one `width`×`height` frame.
    pub fn frame_len(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Rgb3 => pixels * 3,
            PixelFormat::Yuyv => pixels * 2,
            PixelFormat::Grey => pixels,
        }
    }

    /// Converts one raw frame into an RGB image. Trailing driver padding is
    /// ignored; a short buffer is an error.
    pub fn decode(self, width: u32, height: u32, raw: &[u8]) -> Result<RgbImage> {
        let needed = self.frame_len(width, height);
        let raw = raw.get(..needed).ok_or_else(|| {
            anyhow::anyhow!(
                "{:?} frame truncated: {} of {} bytes",
                self,
                raw.len(),
                needed
            )
        })?;

        let rgb = match self {
            PixelFormat::Rgb3 => raw.to_vec(),
            PixelFormat::Yuyv => raw.chunks_exact(4).flat_map(yuyv_pair).collect(),
            PixelFormat::Grey => raw.iter().flat_map(|&l| [l, l, l]).collect(),
        };
        RgbImage::from_raw(width, height, rgb)
            .ok_or_else(|| anyhow::anyhow!("{}x{} frame does not pack evenly", width, height))
    }
}

/// Two horizontally adjacent pixels sharing one chroma sample, BT.601
/// full range in 8.8 fixed point.
fn yuyv_pair(macro_pixel: &[u8]) -> [u8; 6] {
    let u = macro_pixel[1] as i32 - 128;
    let v = macro_pixel[3] as i32 - 128;
    let dr = (359 * v) >> 8;
    let dg = (88 * u + 183 * v) >> 8;
    let db = (454 * u) >> 8;

    let px = |y: u8| {
        let y = y as i32;
        [
            (y + dr).clamp(0, 255) as u8,
            (y - dg).clamp(0, 255) as u8,
            (y + db).clamp(0, 255) as u8,
        ]
    };
    let [r0, g0, b0] = px(macro_pixel[0]);
    let [r1, g1, b1] = px(macro_pixel[2]);
    [r0, g0, b0, r1, g1, b1]
}

/// Live V4L2 capture device.
pub struct Camera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Camera {
    pub fn open(device: &str) -> Result<Self> {
        let dev = Device::with_path(device).with_context(|| format!("open camera {}", device))?;
        let current = dev.format().context("query camera format")?;

        // Ask for each layout in turn and keep the first the driver accepts
        let (fmt, format) = PixelFormat::PREFERRED
            .into_iter()
            .find_map(|wanted| {
                let request = Format::new(current.width, current.height, wanted.fourcc());
                let granted = dev.set_format(&request).ok()?;
                PixelFormat::from_fourcc(granted.fourcc).map(|f| (granted, f))
            })
            .or_else(|| PixelFormat::from_fourcc(current.fourcc).map(|f| (current, f)))
            .ok_or_else(|| anyhow::anyhow!("camera {} offers no usable format", device))?;

        log::info!(
            "camera {}: {}x{} {:?}",
            device,
            fmt.width,
            fmt.height,
            format
        );
        let stream =
            Stream::with_buffers(&dev, Type::VideoCapture, 4).context("start capture stream")?;
        Ok(Self {
            stream,
            width: fmt.width,
            height: fmt.height,
            format,
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn frame(&mut self) -> Result<RgbImage> {
        let (raw, meta) = self.stream.next().context("capture frame")?;
        log::trace!("frame seq={} {} bytes", meta.sequence, raw.len());
        self.format.decode(self.width, self.height, raw)
    }
}

impl FrameSource for Camera {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        self.frame().map(Some)
    }
}
