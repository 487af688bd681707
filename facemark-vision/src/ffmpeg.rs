use std::path::Path;

use anyhow::{Context, Result};
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use image::RgbImage;

use crate::source::FrameSource;

/// Video file decoded through libavformat/libavcodec into RGB24 frames.
pub struct VideoFile {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
    flushing: bool,
    done: bool,
}

impl VideoFile {
    pub fn open(path: &Path) -> Result<Self> {
        ffmpeg_next::init().context("initialise ffmpeg")?;

        let input = ffmpeg_next::format::input(path)
            .with_context(|| format!("open video {}", path.display()))?;

        let (stream_index, decoder, fps) = {
            let stream = input
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or_else(|| anyhow::anyhow!("no video stream in {}", path.display()))?;
            let codec_ctx =
                ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                    .context("read codec parameters")?;
            let decoder = codec_ctx.decoder().video().context("open video decoder")?;
            let rate = stream.rate();
            let fps = if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            };
            (stream.index(), decoder, fps)
        };

        let width = decoder.width();
        let height = decoder.height();
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .context("create RGB converter")?;

        log::info!(
            "video {}: {}x{} at {:.2} fps",
            path.display(),
            width,
            height,
            fps
        );

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            width,
            height,
            flushing: false,
            done: false,
        })
    }

    fn receive(&mut self) -> Result<Option<RgbImage>> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let mut rgb_frame = Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("convert frame to RGB")?;

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        RgbImage::from_raw(self.width, self.height, pixels)
            .map(Some)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "decoded frame smaller than {}x{}",
                    self.width,
                    self.height
                )
            })
    }
}

impl FrameSource for VideoFile {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        loop {
            if self.done {
                return Ok(None);
            }

            if let Some(frame) = self.receive()? {
                return Ok(Some(frame));
            }

            if self.flushing {
                self.done = true;
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::warn!("dropping undecodable packet: {}", e);
                    }
                }
                None => {
                    self.decoder.send_eof().context("flush video decoder")?;
                    self.flushing = true;
                }
            }
        }
    }
}

/// Copies the RGB plane into a tightly packed buffer, dropping row padding.
fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_len]);
    }
    pixels
}
