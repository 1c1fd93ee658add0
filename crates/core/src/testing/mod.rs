//! Testing utilities and mock implementations.
//!
//! Mocks for every external boundary (process spawning, HTTP) plus spy
//! backends, so the whole pipeline can be exercised without ffmpeg or network.
//!
//! # Example
//!
//! ```rust,ignore
//! use stickerline_core::testing::{fixtures, SpyRemote, SpyTranscoder};
//!
//! let transcoder = SpyTranscoder::unavailable();
//! let remote = SpyRemote::succeeding(fixtures::mp4_header());
//!
//! // Build a ConversionOrchestrator around them...
//! assert_eq!(remote.invocations().await, 1);
//! ```

mod mock_process;
mod mock_transport;
mod spies;

pub use mock_process::{MockProcessResponse, MockProcessRunner, RecordedRun};
pub use mock_transport::{MockTransport, RecordedRequest};
pub use spies::{SpyRemote, SpyTranscoder};

/// Test fixtures and helper functions.
pub mod fixtures {
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// A real 4x4 lossy WebP (simple `VP8 ` format, no EXIF).
    pub fn static_webp() -> Vec<u8> {
        let rgb: Vec<u8> = (0..16).flat_map(|i| [i * 16, 128, 255 - i * 16]).collect();
        webp::Encoder::from_rgb(&rgb, 4, 4).encode(80.0).to_vec()
    }

    /// Animated WebP: VP8X with the animation flag, an `ANIM` chunk and two
    /// `ANMF` frames wrapping the image data of [`static_webp`].
    pub fn animated_webp() -> Vec<u8> {
        let still = static_webp();
        // Chunks of the still image, already padded
        let frame_data = &still[12..];

        let mut vp8x = vec![0x02, 0, 0, 0];
        vp8x.extend_from_slice(&u24(3)); // canvas width - 1
        vp8x.extend_from_slice(&u24(3)); // canvas height - 1

        let mut anim = vec![0, 0, 0, 0]; // background colour
        anim.extend_from_slice(&0u16.to_le_bytes()); // loop forever

        let mut anmf = Vec::new();
        anmf.extend_from_slice(&u24(0)); // x / 2
        anmf.extend_from_slice(&u24(0)); // y / 2
        anmf.extend_from_slice(&u24(3)); // width - 1
        anmf.extend_from_slice(&u24(3)); // height - 1
        anmf.extend_from_slice(&u24(100)); // duration ms
        anmf.push(0);
        anmf.extend_from_slice(frame_data);

        let mut body = b"WEBP".to_vec();
        body.extend(chunk(b"VP8X", &vp8x));
        body.extend(chunk(b"ANIM", &anim));
        body.extend(chunk(b"ANMF", &anmf));
        body.extend(chunk(b"ANMF", &anmf));

        let mut riff = b"RIFF".to_vec();
        riff.extend_from_slice(&(body.len() as u32).to_le_bytes());
        riff.extend(body);
        riff
    }

    fn u24(value: u32) -> [u8; 3] {
        let b = value.to_le_bytes();
        [b[0], b[1], b[2]]
    }

    fn chunk(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = fourcc.to_vec();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    /// Start of an MP4 file: an `ftyp` box followed by an empty `free` box.
    pub fn mp4_header() -> Vec<u8> {
        let mut bytes = vec![0, 0, 0, 0x18];
        bytes.extend_from_slice(b"ftypisom");
        bytes.extend_from_slice(&[0, 0, 2, 0]);
        bytes.extend_from_slice(b"isomiso2");
        bytes.extend_from_slice(&[0, 0, 0, 8]);
        bytes.extend_from_slice(b"free");
        bytes
    }

    /// Opaque PNG of the given size.
    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 40, 90, 255]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("png encoding of an in-memory image");
        buf
    }

    /// Page returned after uploading `file`: a conversion form with hidden fields.
    pub fn ezgif_upload_page(file: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html><body>
<div id="main">
  <p class="filestats">Uploaded image: {file}</p>
  <form class="form ajax-form" action="https://ezgif.com/webp-to-mp4/{file}" method="post">
    <input type="hidden" name="file" value="{file}">
    <input type="hidden" name="token" value="abc123">
    <button type="submit" class="primary">Convert WebP to MP4!</button>
  </form>
</div>
</body></html>"#,
            file = file
        )
    }

    /// Result page of a video conversion.
    pub fn ezgif_video_page(src: &str) -> String {
        format!(
            r#"<html><body>
<div id="output">
  <p class="outfile">
    <video class="preview" controls loop><source src="{}" type="video/mp4"></video>
  </p>
</div>
</body></html>"#,
            src
        )
    }

    /// Result page of an image conversion.
    pub fn ezgif_image_page(src: &str) -> String {
        format!(
            r#"<html><body>
<img src="/images/logo.png" alt="ezgif">
<div id="output">
  <p class="outfile"><img src="{}" alt="[converted image]"></p>
</div>
</body></html>"#,
            src
        )
    }
}
