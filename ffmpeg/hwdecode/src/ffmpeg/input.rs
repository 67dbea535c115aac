/*!
    Input container.
*/

use std::path::Path;

use ffmpeg_next::{Packet, format::context::Input as InputFFmpeg};

use ffmpeg_types::{Error, Result};

use crate::backend::{CompressedUnit, MediaInput};

impl CompressedUnit for Packet {
    fn stream_index(&self) -> usize {
        self.stream()
    }
}

/**
    An opened input container with its stream info read.
*/
pub struct FfmpegInput {
    pub(crate) ctx: InputFFmpeg,
}

impl FfmpegInput {
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let input_open = |e: ffmpeg_next::Error| Error::InputOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        ffmpeg_next::init().map_err(input_open)?;
        let ctx = ffmpeg_next::format::input(path).map_err(input_open)?;

        tracing::debug!(
            path = %path.display(),
            streams = ctx.nb_streams(),
            "opened input"
        );
        Ok(Self { ctx })
    }
}

impl MediaInput for FfmpegInput {
    type Packet = Packet;

    fn read_packet(&mut self) -> Option<Packet> {
        let mut packet = Packet::empty();
        match packet.read(&mut self.ctx) {
            Ok(()) => Some(packet),
            Err(ffmpeg_next::Error::Eof) => None,
            Err(e) => {
                tracing::warn!("read error, treating as end of input: {e}");
                None
            }
        }
    }
}
