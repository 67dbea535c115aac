/*!
    Hardware device context wrapper.
*/

use std::{ffi::CStr, ptr};

use ffmpeg_next::ffi;

use ffmpeg_types::{Error, Result};

/**
    Get FFmpeg's name for a device type, e.g. `"vaapi"`.
*/
pub(crate) fn device_type_name(device_type: ffi::AVHWDeviceType) -> String {
    unsafe {
        let name = ffi::av_hwdevice_get_type_name(device_type);
        if name.is_null() {
            format!("{device_type:?}")
        } else {
            CStr::from_ptr(name).to_string_lossy().into_owned()
        }
    }
}

/**
    Hardware device context wrapper.

    Holds one reference to the underlying buffer. Decoder contexts get their
    own references through [`HwDeviceContext::create_ref`], so the device
    lives until both this wrapper and every decoder using it are gone.
*/
pub struct HwDeviceContext {
    ctx: *mut ffi::AVBufferRef,
    device_type: ffi::AVHWDeviceType,
}

impl HwDeviceContext {
    /**
        Create a hardware device context on the default device for `device_type`.
    */
    pub(crate) fn create(device_type: ffi::AVHWDeviceType) -> Result<Self> {
        let mut hw_device_ctx: *mut ffi::AVBufferRef = ptr::null_mut();
        let ret = unsafe {
            ffi::av_hwdevice_ctx_create(
                &mut hw_device_ctx,
                device_type,
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };

        if ret < 0 || hw_device_ctx.is_null() {
            return Err(Error::HardwareDeviceCreation {
                device: device_type_name(device_type),
                message: ffmpeg_next::Error::from(ret).to_string(),
            });
        }

        tracing::debug!(device = %device_type_name(device_type), "created hardware device context");
        Ok(Self {
            ctx: hw_device_ctx,
            device_type,
        })
    }

    pub fn device_type(&self) -> ffi::AVHWDeviceType {
        self.device_type
    }

    /**
        Create a new reference to the context for use in a decoder.
    */
    pub(crate) fn create_ref(&self) -> *mut ffi::AVBufferRef {
        unsafe { ffi::av_buffer_ref(self.ctx) }
    }
}

impl Drop for HwDeviceContext {
    fn drop(&mut self) {
        if !self.ctx.is_null() {
            unsafe {
                ffi::av_buffer_unref(&mut self.ctx);
            }
        }
    }
}

// SAFETY: The FFmpeg buffer reference is internally reference-counted
// and thread-safe for the operations we perform.
unsafe impl Send for HwDeviceContext {}
