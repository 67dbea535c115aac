/*!
    Caller-owned output buffer for decoded frames.
*/

use crate::PixelFormat;

/**
    A host-memory buffer that decoded frames are copied into.

    The buffer starts out empty and is allocated once, sized to the first
    frame written into it. Its geometry never changes afterwards, so every
    later frame must have the same dimensions and host format.

    Pixel data is packed with 1-byte row alignment: planar formats store
    their planes back to back, packed formats store rows back to back.
*/
#[derive(Clone, Debug, Default)]
pub struct FrameBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: Option<PixelFormat>,
    frames_written: u64,
}

impl FrameBuffer {
    /**
        Create a new, unallocated buffer.
    */
    pub fn new() -> Self {
        Self::default()
    }

    /**
        Returns true once the buffer has been sized to a frame.
    */
    pub fn is_allocated(&self) -> bool {
        !self.data.is_empty()
    }

    /**
        Allocate `size` zeroed bytes for frames of the given geometry.

        Does nothing if the buffer is already allocated.
    */
    pub fn allocate(&mut self, width: u32, height: u32, format: Option<PixelFormat>, size: usize) {
        if self.is_allocated() {
            return;
        }
        self.data = vec![0u8; size];
        self.width = width;
        self.height = height;
        self.format = format;
    }

    /**
        Returns true if a frame of this geometry and host format fits the
        allocated buffer exactly.
    */
    pub fn fits(&self, width: u32, height: u32, format: Option<PixelFormat>, size: usize) -> bool {
        self.width == width
            && self.height == height
            && self.format == format
            && self.data.len() == size
    }

    /// Width in pixels of the frames this buffer holds.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels of the frames this buffer holds.
    pub fn height(&self) -> u32 {
        self.height
    }

    /**
        Host pixel format of the data, if it is one of the known formats.
    */
    pub fn format(&self) -> Option<PixelFormat> {
        self.format
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /**
        Returns the pixel data of the most recently written frame.
    */
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /**
        Returns the pixel data for writing.

        Callers filling the buffer should follow up with [`FrameBuffer::mark_written`].
    */
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /**
        Record that a complete frame has been written into the buffer.
    */
    pub fn mark_written(&mut self) {
        self.frames_written += 1;
    }

    /**
        Returns the number of frames written into this buffer so far.
    */
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

// Ensure the buffer can be handed to another thread after decoding
static_assertions::assert_impl_all!(FrameBuffer: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_unallocated() {
        let buffer = FrameBuffer::new();
        assert!(!buffer.is_allocated());
        assert!(buffer.is_empty());
        assert_eq!(buffer.format(), None);
        assert_eq!(buffer.frames_written(), 0);
    }

    #[test]
    fn allocate_sizes_once() {
        let mut buffer = FrameBuffer::new();
        buffer.allocate(64, 48, Some(PixelFormat::Nv12), 4608);
        assert!(buffer.is_allocated());
        assert_eq!(buffer.len(), 4608);
        assert_eq!(buffer.width(), 64);
        assert_eq!(buffer.height(), 48);
        assert_eq!(buffer.format(), Some(PixelFormat::Nv12));

        let ptr = buffer.data().as_ptr();
        buffer.allocate(128, 96, Some(PixelFormat::Nv12), 18432);
        assert_eq!(buffer.len(), 4608);
        assert_eq!(buffer.width(), 64);
        assert_eq!(buffer.data().as_ptr(), ptr);
    }

    #[test]
    fn fits_checks_geometry_and_size() {
        let nv12 = Some(PixelFormat::Nv12);
        let mut buffer = FrameBuffer::new();
        buffer.allocate(64, 48, nv12, 4608);
        assert!(buffer.fits(64, 48, nv12, 4608));
        assert!(!buffer.fits(48, 64, nv12, 4608));
        assert!(!buffer.fits(64, 48, nv12, 6144));
    }

    #[test]
    fn fits_rejects_other_format_of_same_size() {
        let mut buffer = FrameBuffer::new();
        buffer.allocate(64, 48, Some(PixelFormat::Yuv420p), 4608);
        assert_eq!(PixelFormat::Nv12.buffer_size(64, 48), Some(4608));
        assert!(!buffer.fits(64, 48, Some(PixelFormat::Nv12), 4608));
        assert!(!buffer.fits(64, 48, None, 4608));
        assert!(buffer.fits(64, 48, Some(PixelFormat::Yuv420p), 4608));
    }

    #[test]
    fn mark_written_counts_frames() {
        let mut buffer = FrameBuffer::new();
        buffer.allocate(2, 2, Some(PixelFormat::Rgba), 16);
        buffer.data_mut().fill(7);
        buffer.mark_written();
        buffer.mark_written();
        assert_eq!(buffer.frames_written(), 2);
        assert!(buffer.data().iter().all(|b| *b == 7));
    }
}
