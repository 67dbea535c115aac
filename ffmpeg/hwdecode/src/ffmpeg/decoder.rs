/*!
    Decoder context and opened decoder.
*/

use std::{ffi::c_void, ptr};

use ffmpeg_next::{
    Packet, ffi,
    format::Pixel,
    packet::Ref as PacketRef,
    util::frame::video::Video as VideoFrameFFmpeg,
};

use ffmpeg_types::{Error, Result};

use crate::{
    backend::{FrameDecoder, Received, SendStatus},
    hw::FormatNegotiation,
};

use super::frame::FfmpegFrame;

/**
    `get_format` hook: pick the negotiated hardware format out of the decoder's offer.

    Reads its state through `AVCodecContext::opaque`, see [`CodecContext::set_hw_format`].
*/
unsafe extern "C" fn negotiate_hw_format(
    ctx: *mut ffi::AVCodecContext,
    formats: *const ffi::AVPixelFormat,
) -> ffi::AVPixelFormat {
    let negotiation = unsafe { &*((*ctx).opaque as *const FormatNegotiation<Pixel>) };

    let mut offered = Vec::new();
    let mut p = formats;
    unsafe {
        while !p.is_null() && *p != ffi::AVPixelFormat::AV_PIX_FMT_NONE {
            offered.push(Pixel::from(*p));
            p = p.add(1);
        }
    }

    match negotiation.negotiate(&offered) {
        Some(format) => format.into(),
        None => {
            tracing::warn!(
                wanted = ?negotiation.hw_format(),
                ?offered,
                "failed to get hardware surface format"
            );
            ffi::AVPixelFormat::AV_PIX_FMT_NONE
        }
    }
}

/**
    An allocated, not yet opened, decoder context.

    Freed on drop, together with its device reference.
*/
pub struct CodecContext {
    ptr: *mut ffi::AVCodecContext,
    negotiation: Option<Box<FormatNegotiation<Pixel>>>,
}

impl CodecContext {
    pub(crate) fn alloc(codec: *const ffi::AVCodec) -> Result<Self> {
        let ptr = unsafe { ffi::avcodec_alloc_context3(codec) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("decoder context"));
        }
        Ok(Self {
            ptr,
            negotiation: None,
        })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut ffi::AVCodecContext {
        self.ptr
    }

    /**
        Install the `get_format` hook. The state it reads is owned by this context.
    */
    pub(crate) fn set_hw_format(&mut self, hw_format: Pixel) {
        let negotiation = Box::new(FormatNegotiation::new(hw_format));
        unsafe {
            (*self.ptr).opaque = &*negotiation as *const FormatNegotiation<Pixel> as *mut c_void;
            (*self.ptr).get_format = Some(negotiate_hw_format);
        }
        self.negotiation = Some(negotiation);
    }

    /**
        Fail with `NoMatchingPixelFormat` if the `get_format` hook has rejected
        the decoder's offer at any point, regardless of what FFmpeg returned.
    */
    fn check_negotiation(&self) -> Result<()> {
        match &self.negotiation {
            Some(negotiation) => negotiation.check(),
            None => Ok(()),
        }
    }

    pub(crate) fn open(self, codec: *const ffi::AVCodec, stream: usize) -> Result<FfmpegDecoder> {
        let ret = unsafe { ffi::avcodec_open2(self.ptr, codec, ptr::null_mut()) };
        self.check_negotiation()?;
        if ret < 0 {
            return Err(Error::CodecOpen {
                stream,
                message: ffmpeg_next::Error::from(ret).to_string(),
            });
        }
        Ok(FfmpegDecoder { context: self })
    }
}

impl Drop for CodecContext {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                ffi::avcodec_free_context(&mut self.ptr);
            }
        }
    }
}

// SAFETY: The context and its negotiation state are owned exclusively by this
// wrapper and never used concurrently, so moving it to another thread is sound.
unsafe impl Send for CodecContext {}

/**
    An opened hardware decoder.
*/
pub struct FfmpegDecoder {
    context: CodecContext,
}

impl FrameDecoder for FfmpegDecoder {
    type Packet = Packet;
    type Format = Pixel;
    type Frame = FfmpegFrame;

    fn send_packet(&mut self, packet: &Packet) -> Result<SendStatus> {
        let ret = unsafe { ffi::avcodec_send_packet(self.context.ptr, packet.as_ptr()) };
        self.context.check_negotiation()?;
        match ret {
            r if r >= 0 => Ok(SendStatus::Accepted),
            r if r == ffi::AVERROR(ffi::EAGAIN) => Ok(SendStatus::Full),
            r => Err(Error::DecodeSubmit(ffmpeg_next::Error::from(r).to_string())),
        }
    }

    fn send_eof(&mut self) -> Result<()> {
        let ret = unsafe { ffi::avcodec_send_packet(self.context.ptr, ptr::null()) };
        self.context.check_negotiation()?;
        if ret < 0 && ret != ffi::AVERROR_EOF {
            return Err(Error::DecodeSubmit(ffmpeg_next::Error::from(ret).to_string()));
        }
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Received<FfmpegFrame>> {
        let mut frame = VideoFrameFFmpeg::empty();
        let ret = unsafe { ffi::avcodec_receive_frame(self.context.ptr, frame.as_mut_ptr()) };
        self.context.check_negotiation()?;
        match ret {
            r if r >= 0 => Ok(Received::Frame(FfmpegFrame(frame))),
            r if r == ffi::AVERROR(ffi::EAGAIN) => Ok(Received::NeedsInput),
            r if r == ffi::AVERROR_EOF => Ok(Received::Exhausted),
            r => Err(Error::FrameReceive(ffmpeg_next::Error::from(r).to_string())),
        }
    }
}
