/*!
    Error types for hardware-accelerated decode sessions.
*/

use std::path::PathBuf;

use thiserror::Error;

/**
    Error type for decode sessions.

    Every failure is surfaced to the caller as-is, there is no internal retry.
*/
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Requested accelerator type name not recognized by the codec library.
    #[error("unsupported hardware accelerator: {name}")]
    UnsupportedAccelerator { name: String },
    /// Container cannot be opened or its streams cannot be read.
    #[error("cannot open input {}: {message}", path.display())]
    InputOpen { path: PathBuf, message: String },
    /// No suitable video stream in the input.
    #[error("cannot find a video stream in the input")]
    NoVideoStream,
    /// Decoder has no configuration matching the requested accelerator.
    #[error("decoder {decoder} does not support device type {device}")]
    UnsupportedHardwareConfig { decoder: String, device: String },
    /// Allocation failure inside the codec library.
    #[error("out of memory allocating {0}")]
    OutOfMemory(&'static str),
    /// Stream codec parameters incompatible with the decoder context.
    #[error("cannot bind stream parameters: {0}")]
    ParameterBinding(String),
    /// Decoder offered no pixel format matching the negotiated hardware format.
    #[error("failed to get hardware surface format {0}")]
    NoMatchingPixelFormat(String),
    /// Platform or driver cannot provide the accelerator.
    #[error("failed to create hardware device {device}: {message}")]
    HardwareDeviceCreation { device: String, message: String },
    /// Decoder failed to open.
    #[error("failed to open codec for stream #{stream}: {message}")]
    CodecOpen { stream: usize, message: String },
    /// Decoder rejected a compressed unit.
    #[error("error during decoding: {0}")]
    DecodeSubmit(String),
    /// Decoder reported a hard error while producing a frame.
    #[error("error while decoding: {0}")]
    FrameReceive(String),
    /// Device to host transfer of a decoded frame failed.
    #[error("error transferring the data to system memory: {0}")]
    FrameTransfer(String),
    /// Decoded pixels could not be copied into the output buffer.
    #[error("cannot copy image to buffer: {0}")]
    ImageCopy(String),
    /// Frames were requested before a successful `init`.
    #[error("decode session is not initialized")]
    NotInitialized,
    /// End of stream (not really an error, but part of control flow)
    #[error("end of stream")]
    Eof,
}

impl Error {
    /**
        Returns true if this is the end-of-stream signal.
    */
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }
}

/**
    Result type alias for decode sessions.
*/
pub type Result<T> = std::result::Result<T, Error>;
