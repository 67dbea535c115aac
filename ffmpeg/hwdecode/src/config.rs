/*!
    Decode session configuration types.
*/

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Output path used when none is given.
pub const DEFAULT_OUTPUT: &str = "out.yuv";

/// Accelerator used when none is given.
pub const DEFAULT_ACCELERATOR: &str = "vaapi";

/**
    Hardware device type for hardware-accelerated decoding.

    Each variant maps to the accelerator name FFmpeg resolves it by.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HwDevice {
    /// VAAPI (Linux - AMD, Intel)
    Vaapi,
    /// CUDA/NVDEC (NVIDIA)
    Cuda,
    /// VideoToolbox (macOS)
    VideoToolbox,
    /// Quick Sync Video (Intel)
    Qsv,
    /// Direct3D 11 (Windows)
    D3d11va,
    /// DXVA2 (Windows)
    Dxva2,
    /// VDPAU (Linux - NVIDIA legacy)
    Vdpau,
    /// DRM PRIME (Linux - V4L2 and embedded decoders)
    Drm,
}

impl HwDevice {
    pub const ALL: [Self; 8] = [
        Self::Vaapi,
        Self::Cuda,
        Self::VideoToolbox,
        Self::Qsv,
        Self::D3d11va,
        Self::Dxva2,
        Self::Vdpau,
        Self::Drm,
    ];

    /**
        Get the FFmpeg accelerator name for this device.
    */
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vaapi => "vaapi",
            Self::Cuda => "cuda",
            Self::VideoToolbox => "videotoolbox",
            Self::Qsv => "qsv",
            Self::D3d11va => "d3d11va",
            Self::Dxva2 => "dxva2",
            Self::Vdpau => "vdpau",
            Self::Drm => "drm",
        }
    }
}

impl fmt::Display for HwDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HwDevice {
    type Err = ffmpeg_types::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|device| device.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ffmpeg_types::Error::UnsupportedAccelerator { name: s.to_owned() })
    }
}

/**
    Configuration for a decode session.

    Immutable once the session is constructed. The accelerator is kept as a
    name and only resolved by the codec library during `init`, so names for
    devices not listed in [`HwDevice`] still work when FFmpeg knows them.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    input: PathBuf,
    #[serde(default = "default_output")]
    output: PathBuf,
    #[serde(default = "default_accelerator")]
    accelerator: String,
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

fn default_accelerator() -> String {
    DEFAULT_ACCELERATOR.to_owned()
}

impl SessionConfig {
    /**
        Create a config for the given input with the default output path and accelerator.
    */
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: default_output(),
            accelerator: default_accelerator(),
        }
    }

    /**
        Set the output path.

        The session only records it, writing decoded frames anywhere is up to the caller.
    */
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /**
        Set the accelerator by its FFmpeg name, e.g. `"vaapi"` or `"cuda"`.
    */
    #[must_use]
    pub fn with_accelerator(mut self, name: impl Into<String>) -> Self {
        self.accelerator = name.into();
        self
    }

    /**
        Set the accelerator to a specific hardware device.
    */
    #[must_use]
    pub fn with_hw_device(self, device: HwDevice) -> Self {
        self.with_accelerator(device.name())
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn accelerator(&self) -> &str {
        &self.accelerator
    }
}
