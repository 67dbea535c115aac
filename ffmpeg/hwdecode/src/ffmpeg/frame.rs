/*!
    Decoded FFmpeg frames.
*/

use ffmpeg_next::{ffi, format::Pixel, util::frame::video::Video as VideoFrameFFmpeg};

use ffmpeg_types::{Error, PixelFormat, Result};

use crate::backend::DecodedFrame;

/**
    A frame received from an FFmpeg decoder.

    The frame is freed on drop.
*/
pub struct FfmpegFrame(pub(crate) VideoFrameFFmpeg);

impl FfmpegFrame {
    fn ffi_format(&self) -> ffi::AVPixelFormat {
        self.0.format().into()
    }
}

impl DecodedFrame for FfmpegFrame {
    type Format = Pixel;

    fn format(&self) -> Pixel {
        self.0.format()
    }

    fn width(&self) -> u32 {
        self.0.width()
    }

    fn height(&self) -> u32 {
        self.0.height()
    }

    fn pixel_format(&self) -> Option<PixelFormat> {
        pixel_format_from_ffmpeg(self.0.format()).filter(|format| !format.is_hardware())
    }

    fn transfer_to_host(&self) -> Result<Self> {
        let mut host = VideoFrameFFmpeg::empty();
        let ret = unsafe { ffi::av_hwframe_transfer_data(host.as_mut_ptr(), self.0.as_ptr(), 0) };
        if ret < 0 {
            return Err(Error::FrameTransfer(ffmpeg_next::Error::from(ret).to_string()));
        }
        Ok(Self(host))
    }

    fn buffer_size(&self) -> Result<usize> {
        let size = unsafe {
            ffi::av_image_get_buffer_size(
                self.ffi_format(),
                self.0.width() as i32,
                self.0.height() as i32,
                1,
            )
        };
        usize::try_from(size).map_err(|_| {
            Error::ImageCopy(format!(
                "no buffer size for {:?} {}x{}: {}",
                self.0.format(),
                self.0.width(),
                self.0.height(),
                ffmpeg_next::Error::from(size)
            ))
        })
    }

    fn copy_to_buffer(&self, dst: &mut [u8]) -> Result<usize> {
        let dst_size = i32::try_from(dst.len())
            .map_err(|_| Error::ImageCopy("output buffer exceeds FFmpeg size limits".into()))?;

        let ret = unsafe {
            let frame = self.0.as_ptr();
            ffi::av_image_copy_to_buffer(
                dst.as_mut_ptr(),
                dst_size,
                (*frame).data.as_ptr() as *const *const u8,
                (*frame).linesize.as_ptr(),
                self.ffi_format(),
                (*frame).width,
                (*frame).height,
                1,
            )
        };

        usize::try_from(ret)
            .map_err(|_| Error::ImageCopy(ffmpeg_next::Error::from(ret).to_string()))
    }
}

/**
    Convert an FFmpeg pixel format to our PixelFormat.
*/
pub(crate) fn pixel_format_from_ffmpeg(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        Pixel::P010LE => Some(PixelFormat::P010),
        Pixel::YUV420P10LE => Some(PixelFormat::Yuv420p10),
        Pixel::YUV422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P => Some(PixelFormat::Yuv444p),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::BGR24 => Some(PixelFormat::Bgr24),
        Pixel::VAAPI => Some(PixelFormat::Vaapi),
        Pixel::CUDA => Some(PixelFormat::Cuda),
        Pixel::VIDEOTOOLBOX => Some(PixelFormat::VideoToolbox),
        Pixel::QSV => Some(PixelFormat::Qsv),
        Pixel::D3D11 => Some(PixelFormat::D3d11),
        Pixel::DXVA2_VLD => Some(PixelFormat::Dxva2),
        Pixel::VDPAU => Some(PixelFormat::Vdpau),
        Pixel::DRM_PRIME => Some(PixelFormat::DrmPrime),
        _ => None,
    }
}
