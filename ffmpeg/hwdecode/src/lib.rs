/*!
    Hardware-accelerated video decode sessions on top of FFmpeg.

    A [`DecodeSession`] opens an input, selects its best video stream and a
    decoder configuration for the requested accelerator, creates the hardware
    device, and then hands out decoded frames one at a time, copied to host
    memory in a caller-owned [`FrameBuffer`].

    # Example

    ```ignore
    use ffmpeg_hwdecode::{DecodeSession, FrameBuffer, HwDevice, SessionConfig};

    let config = SessionConfig::new("video.mp4").with_hw_device(HwDevice::Vaapi);
    let mut session = DecodeSession::new(config);
    session.init()?;

    let mut buffer = FrameBuffer::new();
    while let Ok(()) = session.get_frame(&mut buffer) {
        // buffer.data() holds the frame, packed with 1-byte row alignment
    }
    ```

    # Codec Library

    The session only sequences library calls, everything it needs from FFmpeg
    goes through the [`CodecLibrary`] trait. [`FfmpegLibrary`] is the default
    implementation, other implementations can be passed to
    [`DecodeSession::with_library`].

    # Logging

    Events are emitted through `tracing`. Install a subscriber to see them.
*/

pub use ffmpeg_types::{Error, FrameBuffer, PixelFormat, Result};

mod backend;
mod config;
mod ffmpeg;
mod hw;
mod session;

#[cfg(test)]
mod mock;

pub use backend::{
    CodecLibrary, CompressedUnit, DecodedFrame, FrameDecoder, MediaInput, PacketOf, Received,
    SendStatus,
};
pub use config::{DEFAULT_ACCELERATOR, DEFAULT_OUTPUT, HwDevice, SessionConfig};
pub use ffmpeg::{
    CodecContext, FfmpegCodec, FfmpegDecoder, FfmpegFrame, FfmpegInput, FfmpegLibrary,
    HwDeviceContext,
};
pub use hw::{HwConfig, HwConfigMethods, negotiate_format, select_hw_config};
pub use session::{DecodeSession, SessionState};
