/*!
    The codec library operations a decode session sequences.

    A [`DecodeSession`](crate::DecodeSession) never talks to FFmpeg directly,
    it drives a [`CodecLibrary`] through the handful of operations below.
    [`FfmpegLibrary`](crate::FfmpegLibrary) is the real implementation.
*/

use std::{fmt, path::Path};

use ffmpeg_types::{PixelFormat, Result};

use crate::hw::HwConfig;

/**
    An opened input container.
*/
pub trait MediaInput {
    type Packet: CompressedUnit;

    /**
        Read the next compressed unit, from any stream.

        Returns `None` once the input has no more units.
    */
    fn read_packet(&mut self) -> Option<Self::Packet>;
}

/**
    One demuxed chunk of encoded stream data.
*/
pub trait CompressedUnit {
    /// Index of the stream this unit belongs to.
    fn stream_index(&self) -> usize;
}

/**
    Outcome of submitting a compressed unit to a decoder.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStatus {
    /// The decoder took the unit.
    Accepted,
    /// The decoder must be drained before it takes more input.
    Full,
}

/**
    Outcome of asking a decoder for a frame.
*/
#[derive(Debug)]
pub enum Received<F> {
    /// A decoded frame.
    Frame(F),
    /// No frame yet, the decoder needs more input.
    NeedsInput,
    /// The decoder has been flushed and has no more frames.
    Exhausted,
}

/**
    An opened decoder bound to one stream and one hardware device.
*/
pub trait FrameDecoder {
    type Packet;
    type Format: Copy + Eq + fmt::Debug;
    type Frame: DecodedFrame<Format = Self::Format>;

    fn send_packet(&mut self, packet: &Self::Packet) -> Result<SendStatus>;

    /**
        Submit the empty unit that puts the decoder into flush mode.
    */
    fn send_eof(&mut self) -> Result<()>;

    fn receive_frame(&mut self) -> Result<Received<Self::Frame>>;
}

/**
    A decoded frame, either in device memory or in host memory.

    Dropping a frame releases it.
*/
pub trait DecodedFrame: Sized {
    type Format: Copy + Eq + fmt::Debug;

    fn format(&self) -> Self::Format;

    fn width(&self) -> u32;

    fn height(&self) -> u32;

    /**
        The host pixel format, if the frame format is one [`PixelFormat`] knows.

        `None` for frames still in device memory.
    */
    fn pixel_format(&self) -> Option<PixelFormat>;

    /**
        Copy a device-memory frame into a new host-memory frame.
    */
    fn transfer_to_host(&self) -> Result<Self>;

    /**
        Bytes required to hold this frame with 1-byte row alignment.
    */
    fn buffer_size(&self) -> Result<usize>;

    /**
        Copy the image into `dst` with 1-byte row alignment, returning the bytes written.
    */
    fn copy_to_buffer(&self, dst: &mut [u8]) -> Result<usize>;
}

/**
    Handle type of the compressed units read from a [`CodecLibrary`] input.
*/
pub type PacketOf<L> = <<L as CodecLibrary>::Input as MediaInput>::Packet;

/**
    The external codec library.

    Every handle type releases its resources on drop.
*/
pub trait CodecLibrary {
    type DeviceType: Copy + Eq + fmt::Debug;
    type Format: Copy + Eq + fmt::Debug;
    /// Decoder candidate, as returned by stream selection.
    type Codec;
    type Input: MediaInput;
    /// Allocated but not yet opened decoder context.
    type Context;
    /// Hardware device context.
    type Device;
    type Decoder: FrameDecoder<Packet = PacketOf<Self>, Format = Self::Format>;

    /**
        Resolve an accelerator name, e.g. `"vaapi"`, to a device type.
    */
    fn find_device_type(&self, name: &str) -> Option<Self::DeviceType>;

    /**
        Open the container at `path` and read its stream info.
    */
    fn open_input(&self, path: &Path) -> Result<Self::Input>;

    /**
        Pick the best video stream, returning its index and a decoder for it.
    */
    fn find_best_video_stream(&self, input: &Self::Input) -> Option<(usize, Self::Codec)>;

    fn codec_name(&self, codec: &Self::Codec) -> String;

    /**
        The hardware configurations the decoder advertises, in library order.
    */
    fn hw_configs(&self, codec: &Self::Codec) -> Vec<HwConfig<Self::DeviceType, Self::Format>>;

    fn alloc_context(&self, codec: &Self::Codec) -> Result<Self::Context>;

    /**
        Copy the codec parameters of stream `stream` into the context.
    */
    fn bind_parameters(
        &self,
        context: &mut Self::Context,
        input: &Self::Input,
        stream: usize,
    ) -> Result<()>;

    /**
        Make the decoder pick `hw_format` when it negotiates its output format.
    */
    fn install_format_negotiation(&self, context: &mut Self::Context, hw_format: Self::Format);

    fn create_device(&self, device_type: Self::DeviceType) -> Result<Self::Device>;

    /**
        Hand the context its own reference to the device.
    */
    fn attach_device(&self, context: &mut Self::Context, device: &Self::Device);

    fn open_decoder(
        &self,
        context: Self::Context,
        codec: &Self::Codec,
        stream: usize,
    ) -> Result<Self::Decoder>;
}
