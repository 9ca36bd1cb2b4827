//! GIF export of rendered episodes.
use anyhow::{Context, Result};
use image::{codecs::gif::GifEncoder, Delay, Frame as GifFrame, RgbaImage};
use option_critic_core::Frame;
use std::{fs::File, path::Path};

/// Encodes RGB frames into an animated GIF at the given frame rate.
pub fn save_gif(frames: &[Frame], path: impl AsRef<Path>, fps: u32) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = GifEncoder::new(file);

    for frame in frames {
        let mut rgba = Vec::with_capacity(frame.data.len() / 3 * 4);
        for px in frame.data.chunks(3) {
            rgba.extend_from_slice(px);
            rgba.push(255);
        }
        let buf = RgbaImage::from_raw(frame.width, frame.height, rgba)
            .context("frame data does not match its dimensions")?;
        encoder.encode_frame(GifFrame::from_parts(
            buf,
            0,
            0,
            Delay::from_numer_denom_ms(1000, fps),
        ))?;
    }
    Ok(())
}
