/*!
    Shared types for hardware-accelerated decoding.

    This crate defines the vocabulary that crosses crate boundaries. It has no
    dependency on FFmpeg, so consumers can hold frames and match on errors
    without pulling in FFmpeg bindings.

    # Core Types

    - [`FrameBuffer`] - Caller-owned host buffer that decoded frames are copied into
    - [`PixelFormat`] - Host and hardware pixel formats, with packed buffer sizes

    # Error Handling

    - [`Error`] and [`Result`] - Decode session error taxonomy
*/

mod error;
mod format;
mod frame;

pub use error::{Error, Result};
pub use format::PixelFormat;
pub use frame::FrameBuffer;
