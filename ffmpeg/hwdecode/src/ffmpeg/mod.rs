/*!
    FFmpeg implementation of the codec library operations.
*/

use std::{
    ffi::{CStr, CString},
    path::Path,
    ptr,
};

use ffmpeg_next::{ffi, format::Pixel};

use ffmpeg_types::{Error, Result};

use crate::{
    backend::CodecLibrary,
    hw::{HwConfig, HwConfigMethods},
};

mod decoder;
mod device;
mod frame;
mod input;

pub use decoder::{CodecContext, FfmpegDecoder};
pub use device::HwDeviceContext;
pub use frame::FfmpegFrame;
pub use input::FfmpegInput;

/**
    A decoder candidate returned by stream selection.

    Points at a static FFmpeg codec descriptor, nothing to free.
*/
#[derive(Clone, Copy, Debug)]
pub struct FfmpegCodec(*const ffi::AVCodec);

/**
    The FFmpeg codec library.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegLibrary;

impl FfmpegLibrary {
    pub fn new() -> Self {
        Self
    }

    /**
        List the accelerator names this FFmpeg build supports.
    */
    pub fn available_device_types(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut device_type = ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;
        loop {
            device_type = unsafe { ffi::av_hwdevice_iterate_types(device_type) };
            if device_type == ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
                break;
            }
            names.push(device::device_type_name(device_type));
        }
        names
    }
}

impl CodecLibrary for FfmpegLibrary {
    type DeviceType = ffi::AVHWDeviceType;
    type Format = Pixel;
    type Codec = FfmpegCodec;
    type Input = FfmpegInput;
    type Context = CodecContext;
    type Device = HwDeviceContext;
    type Decoder = FfmpegDecoder;

    fn find_device_type(&self, name: &str) -> Option<ffi::AVHWDeviceType> {
        let name = CString::new(name).ok()?;
        let device_type = unsafe { ffi::av_hwdevice_find_type_by_name(name.as_ptr()) };
        if device_type == ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            tracing::debug!(available = ?self.available_device_types(), "unknown accelerator");
            return None;
        }
        Some(device_type)
    }

    fn open_input(&self, path: &Path) -> Result<FfmpegInput> {
        FfmpegInput::open(path)
    }

    fn find_best_video_stream(&self, input: &FfmpegInput) -> Option<(usize, FfmpegCodec)> {
        let mut codec: *const ffi::AVCodec = ptr::null();
        let index = unsafe {
            ffi::av_find_best_stream(
                input.ctx.as_ptr() as *mut ffi::AVFormatContext,
                ffi::AVMediaType::AVMEDIA_TYPE_VIDEO,
                -1,
                -1,
                &mut codec,
                0,
            )
        };
        if index < 0 || codec.is_null() {
            return None;
        }
        Some((index as usize, FfmpegCodec(codec)))
    }

    fn codec_name(&self, codec: &FfmpegCodec) -> String {
        unsafe { CStr::from_ptr((*codec.0).name) }
            .to_string_lossy()
            .into_owned()
    }

    fn hw_configs(&self, codec: &FfmpegCodec) -> Vec<HwConfig<ffi::AVHWDeviceType, Pixel>> {
        let mut configs = Vec::new();
        for index in 0.. {
            let config = unsafe { ffi::avcodec_get_hw_config(codec.0, index) };
            if config.is_null() {
                break;
            }
            let config = unsafe { &*config };
            configs.push(HwConfig {
                methods: HwConfigMethods::from_bits(config.methods as u32),
                device_type: config.device_type,
                pix_fmt: Pixel::from(config.pix_fmt),
            });
        }
        configs
    }

    fn alloc_context(&self, codec: &FfmpegCodec) -> Result<CodecContext> {
        CodecContext::alloc(codec.0)
    }

    fn bind_parameters(
        &self,
        context: &mut CodecContext,
        input: &FfmpegInput,
        stream: usize,
    ) -> Result<()> {
        let stream = input
            .ctx
            .stream(stream)
            .ok_or_else(|| Error::ParameterBinding(format!("no stream #{stream}")))?;
        let parameters = stream.parameters();

        let ret = unsafe {
            ffi::avcodec_parameters_to_context(context.as_mut_ptr(), parameters.as_ptr())
        };
        if ret < 0 {
            return Err(Error::ParameterBinding(ffmpeg_next::Error::from(ret).to_string()));
        }
        Ok(())
    }

    fn install_format_negotiation(&self, context: &mut CodecContext, hw_format: Pixel) {
        context.set_hw_format(hw_format);
    }

    fn create_device(&self, device_type: ffi::AVHWDeviceType) -> Result<HwDeviceContext> {
        HwDeviceContext::create(device_type)
    }

    fn attach_device(&self, context: &mut CodecContext, device: &HwDeviceContext) {
        unsafe {
            (*context.as_mut_ptr()).hw_device_ctx = device.create_ref();
        }
        tracing::debug!(
            device = %device::device_type_name(device.device_type()),
            "attached hardware device to decoder context"
        );
    }

    fn open_decoder(
        &self,
        context: CodecContext,
        codec: &FfmpegCodec,
        stream: usize,
    ) -> Result<FfmpegDecoder> {
        context.open(codec.0, stream)
    }
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::codec::Id;

    use ffmpeg_types::PixelFormat;

    use crate::hw::select_hw_config;

    use super::*;

    fn find_decoder(id: Id) -> FfmpegCodec {
        ffmpeg_next::init().unwrap();
        let codec = ffmpeg_next::codec::decoder::find(id).expect("decoder not built in");
        FfmpegCodec(unsafe { codec.as_ptr() })
    }

    #[test]
    fn unknown_device_type() {
        assert_eq!(FfmpegLibrary::new().find_device_type("nonexistent"), None);
        assert_eq!(FfmpegLibrary::new().find_device_type("va\0api"), None);
    }

    #[test]
    fn available_device_types_resolve() {
        let library = FfmpegLibrary::new();
        for name in library.available_device_types() {
            assert!(library.find_device_type(&name).is_some(), "{name}");
        }
    }

    #[test]
    fn open_missing_input() {
        let err = FfmpegLibrary::new()
            .open_input(Path::new("/nonexistent/input.mp4"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InputOpen { .. }), "{err}");
    }

    #[test]
    fn h264_hw_configs_match_build() {
        let library = FfmpegLibrary::new();
        let codec = find_decoder(Id::H264);
        assert_eq!(library.codec_name(&codec), "h264");

        let available = library.available_device_types();
        let configs = library.hw_configs(&codec);
        for config in &configs {
            let name = device::device_type_name(config.device_type);
            assert!(available.contains(&name), "{name} not in {available:?}");
        }

        if let Some(vaapi) = library.find_device_type("vaapi") {
            let selected = select_hw_config(configs, vaapi).expect("h264 has a vaapi config");
            assert!(selected.methods.contains(HwConfigMethods::HW_DEVICE_CTX));
            assert_eq!(
                frame::pixel_format_from_ffmpeg(selected.pix_fmt),
                Some(PixelFormat::Vaapi)
            );
        }
    }

    #[test]
    fn software_decoder_has_no_hw_configs() {
        let library = FfmpegLibrary::new();
        let codec = find_decoder(Id::RAWVIDEO);
        assert_eq!(library.codec_name(&codec), "rawvideo");
        assert!(library.hw_configs(&codec).is_empty());
    }
}
