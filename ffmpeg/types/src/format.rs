/*!
    Pixel format types.
*/

/**
    Video pixel formats.

    This is a subset of formats commonly encountered when decoding with
    hardware acceleration. Host formats describe pixel data in system memory,
    hardware formats are sentinels for frames whose data lives on a device.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (most common software decoder output)
    Yuv420p,
    /// Semi-planar YUV 4:2:0, 12bpp (most common hardware transfer output)
    Nv12,
    /// Semi-planar YUV 4:2:0, 10-bit in 16-bit words (HDR transfer output)
    P010,
    /// Planar YUV 4:2:0, 10-bit in 16-bit words
    Yuv420p10,
    /// Planar YUV 4:2:2, 16bpp
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp
    Yuv444p,
    /// Packed BGRA, 32bpp
    Bgra,
    /// Packed RGBA, 32bpp
    Rgba,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Packed BGR, 24bpp
    Bgr24,
    /// VAAPI surface
    Vaapi,
    /// CUDA device memory
    Cuda,
    /// VideoToolbox pixel buffer
    VideoToolbox,
    /// Quick Sync surface
    Qsv,
    /// Direct3D 11 texture
    D3d11,
    /// DXVA2 surface
    Dxva2,
    /// VDPAU surface
    Vdpau,
    /// DRM PRIME buffer
    DrmPrime,
}

impl PixelFormat {
    /**
        Returns true if frames in this format reside in device memory.
    */
    pub const fn is_hardware(self) -> bool {
        matches!(
            self,
            Self::Vaapi
                | Self::Cuda
                | Self::VideoToolbox
                | Self::Qsv
                | Self::D3d11
                | Self::Dxva2
                | Self::Vdpau
                | Self::DrmPrime
        )
    }

    /**
        Returns the number of bytes needed to hold one image of the given
        dimensions with rows packed tightly (1-byte alignment).

        Chroma planes of subsampled formats round odd dimensions up.
        Returns `None` for hardware formats.
    */
    pub const fn buffer_size(self, width: u32, height: u32) -> Option<usize> {
        let w = width as usize;
        let h = height as usize;
        let cw = w.div_ceil(2);
        let ch = h.div_ceil(2);
        let size = match self {
            Self::Yuv420p | Self::Nv12 => w * h + 2 * cw * ch,
            Self::P010 | Self::Yuv420p10 => 2 * (w * h + 2 * cw * ch),
            Self::Yuv422p => w * h + 2 * cw * h,
            Self::Yuv444p | Self::Rgb24 | Self::Bgr24 => 3 * w * h,
            Self::Bgra | Self::Rgba => 4 * w * h,
            _ => return None,
        };
        Some(size)
    }
}
