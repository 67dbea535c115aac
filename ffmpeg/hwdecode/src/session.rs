/*!
    Hardware decode session.
*/

use ffmpeg_types::{Error, FrameBuffer, Result};

use crate::{
    backend::{
        CodecLibrary, CompressedUnit, DecodedFrame, FrameDecoder, MediaInput, PacketOf, Received,
        SendStatus,
    },
    config::SessionConfig,
    ffmpeg::FfmpegLibrary,
    hw::select_hw_config,
};

/**
    Lifecycle state of a [`DecodeSession`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// `init` has not succeeded yet.
    Uninitialized,
    /// Reading input and decoding.
    Ready,
    /// Input exhausted, draining frames buffered in the decoder.
    Draining,
    /// Decoder drained, every further request returns end of stream.
    Exhausted,
}

/**
    Handles owned by an initialized session.

    Fields drop in declaration order: the decoder releases its device
    reference before the session's own reference and the input go away.
*/
struct Pipeline<L: CodecLibrary> {
    pending: Option<PacketOf<L>>,
    decoder: L::Decoder,
    _device: L::Device,
    input: L::Input,
    stream_index: usize,
    hw_format: L::Format,
}

/**
    Decodes one video stream of one input with one hardware accelerator.

    Construction performs no I/O, [`DecodeSession::init`] opens everything and
    [`DecodeSession::get_frame`] then pulls one decoded frame per call:

    ```ignore
    use ffmpeg_hwdecode::{DecodeSession, FrameBuffer, SessionConfig};

    let mut session = DecodeSession::new(SessionConfig::new("video.mp4"));
    session.init()?;

    let mut buffer = FrameBuffer::new();
    loop {
        match session.get_frame(&mut buffer) {
            Ok(()) => { /* buffer holds the next frame */ }
            Err(e) if e.is_eof() => break,
            Err(e) => return Err(e),
        }
    }
    ```

    Single-threaded and blocking. Every handle is released when the session
    drops, or when `init` is run again.
*/
pub struct DecodeSession<L: CodecLibrary = FfmpegLibrary> {
    config: SessionConfig,
    library: L,
    pipeline: Option<Pipeline<L>>,
    state: SessionState,
    frame_index: u64,
}

impl DecodeSession<FfmpegLibrary> {
    /**
        Create a session decoding through FFmpeg.
    */
    pub fn new(config: SessionConfig) -> Self {
        Self::with_library(config, FfmpegLibrary::new())
    }
}

impl<L: CodecLibrary> DecodeSession<L> {
    /**
        Create a session decoding through the given codec library.
    */
    pub fn with_library(config: SessionConfig, library: L) -> Self {
        Self {
            config,
            library,
            pipeline: None,
            state: SessionState::Uninitialized,
            frame_index: 0,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /**
        Returns true once the input has been exhausted. Never resets until `init` runs again.
    */
    pub fn is_flushing(&self) -> bool {
        matches!(self.state, SessionState::Draining | SessionState::Exhausted)
    }

    /**
        Number of `get_frame` calls made since `init`.
    */
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /**
        Index of the selected video stream, once initialized.
    */
    pub fn stream_index(&self) -> Option<usize> {
        self.pipeline.as_ref().map(|p| p.stream_index)
    }

    /**
        Open the input, select a video stream and a hardware configuration,
        create the hardware device and open the decoder.

        Any handles from a previous `init` are released first. On failure the
        session stays uninitialized and everything acquired so far is released.
    */
    pub fn init(&mut self) -> Result<()> {
        self.pipeline = None;
        self.state = SessionState::Uninitialized;
        self.frame_index = 0;

        let pipeline = self.open_pipeline()?;

        tracing::info!(
            input = %self.config.input().display(),
            accelerator = self.config.accelerator(),
            stream = pipeline.stream_index,
            hw_format = ?pipeline.hw_format,
            "decode session ready"
        );

        self.pipeline = Some(pipeline);
        self.state = SessionState::Ready;
        Ok(())
    }

    fn open_pipeline(&self) -> Result<Pipeline<L>> {
        let lib = &self.library;
        let accelerator = self.config.accelerator();

        let device_type = lib
            .find_device_type(accelerator)
            .ok_or_else(|| Error::UnsupportedAccelerator {
                name: accelerator.to_owned(),
            })?;
        tracing::debug!(?device_type, "resolved accelerator {accelerator}");

        let input = lib.open_input(self.config.input())?;

        let (stream_index, codec) = lib
            .find_best_video_stream(&input)
            .ok_or(Error::NoVideoStream)?;
        let decoder_name = lib.codec_name(&codec);
        tracing::debug!(stream = stream_index, decoder = %decoder_name, "selected video stream");

        let hw_config = select_hw_config(lib.hw_configs(&codec), device_type).ok_or_else(|| {
            Error::UnsupportedHardwareConfig {
                decoder: decoder_name.clone(),
                device: accelerator.to_owned(),
            }
        })?;
        let hw_format = hw_config.pix_fmt;
        tracing::debug!(?hw_format, "selected hardware configuration");

        let mut context = lib.alloc_context(&codec)?;
        lib.bind_parameters(&mut context, &input, stream_index)?;
        lib.install_format_negotiation(&mut context, hw_format);

        let device = lib.create_device(device_type)?;
        lib.attach_device(&mut context, &device);

        let decoder = lib.open_decoder(context, &codec, stream_index)?;
        tracing::debug!(decoder = %decoder_name, "opened decoder");

        Ok(Pipeline {
            pending: None,
            decoder,
            _device: device,
            input,
            stream_index,
            hw_format,
        })
    }

    /**
        Decode the next frame into `output`.

        The buffer is allocated on first use, sized to the first frame, and
        never reallocated. A later frame with different dimensions is rejected
        with [`Error::ImageCopy`] and the buffer is left as it was.

        Returns [`Error::Eof`] once every frame has been delivered, and keeps
        returning it on every call after that.
    */
    pub fn get_frame(&mut self, output: &mut FrameBuffer) -> Result<()> {
        self.frame_index += 1;

        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(Error::NotInitialized);
        };

        if self.state == SessionState::Ready {
            loop {
                let packet = match pipeline.pending.take() {
                    Some(packet) => packet,
                    None => match pipeline.input.read_packet() {
                        Some(packet) => packet,
                        None => {
                            pipeline.decoder.send_eof()?;
                            self.state = SessionState::Draining;
                            tracing::debug!(
                                frame = self.frame_index,
                                "input exhausted, flushing decoder"
                            );
                            break;
                        }
                    },
                };

                if packet.stream_index() != pipeline.stream_index {
                    continue;
                }

                if pipeline.decoder.send_packet(&packet)? == SendStatus::Full {
                    pipeline.pending = Some(packet);
                }

                match pipeline.decoder.receive_frame()? {
                    Received::Frame(frame) => return deliver(frame, pipeline.hw_format, output),
                    Received::NeedsInput => {}
                    Received::Exhausted => {
                        self.state = SessionState::Exhausted;
                        return Err(Error::Eof);
                    }
                }
            }
        }

        if self.state == SessionState::Draining {
            match pipeline.decoder.receive_frame()? {
                Received::Frame(frame) => return deliver(frame, pipeline.hw_format, output),
                Received::NeedsInput | Received::Exhausted => {
                    self.state = SessionState::Exhausted;
                    tracing::debug!(frame = self.frame_index, "decoder drained");
                }
            }
        }

        Err(Error::Eof)
    }
}

/**
    Bring a decoded frame to host memory and copy it into `output`.
*/
fn deliver<F: DecodedFrame>(
    frame: F,
    hw_format: F::Format,
    output: &mut FrameBuffer,
) -> Result<()> {
    let host = if frame.format() == hw_format {
        frame.transfer_to_host()?
    } else {
        frame
    };

    let size = host.buffer_size()?;
    let (width, height) = (host.width(), host.height());
    let format = host.pixel_format();

    if !output.is_allocated() {
        output.allocate(width, height, format, size);
    } else if !output.fits(width, height, format, size) {
        return Err(Error::ImageCopy(format!(
            "frame is {width}x{height} {format:?} ({size} bytes) \
             but the output buffer holds {}x{} {:?} ({} bytes)",
            output.width(),
            output.height(),
            output.format(),
            output.len()
        )));
    }

    host.copy_to_buffer(output.data_mut())?;
    output.mark_written();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use ffmpeg_types::PixelFormat;

    use crate::{
        hw::{HwConfig, HwConfigMethods},
        mock::{Call, MockLibrary, MockPacket},
    };

    fn session(library: MockLibrary) -> DecodeSession<MockLibrary> {
        DecodeSession::with_library(SessionConfig::new("clip.mp4"), library)
    }

    fn drain(session: &mut DecodeSession<MockLibrary>, buffer: &mut FrameBuffer) -> Vec<u8> {
        let mut ids = Vec::new();
        loop {
            match session.get_frame(buffer) {
                Ok(()) => ids.push(buffer.data()[0]),
                Err(e) if e.is_eof() => return ids,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
    }

    #[test]
    fn construction_performs_no_io() {
        let library = MockLibrary::with_video(3);
        let calls = library.calls();
        let session = session(library);
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(session.config().output(), std::path::Path::new("out.yuv"));
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn init_sequences_library_calls() {
        let library = MockLibrary::with_video(1);
        let calls = library.calls();
        let mut session = session(library);
        session.init().unwrap();

        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.stream_index(), Some(0));
        assert!(!session.is_flushing());
        assert_eq!(
            *calls.borrow(),
            vec![
                Call::FindDeviceType("vaapi".into()),
                Call::OpenInput,
                Call::FindBestVideoStream,
                Call::HwConfigs,
                Call::AllocContext,
                Call::BindParameters(0),
                Call::InstallFormatNegotiation(PixelFormat::Vaapi),
                Call::CreateDevice("vaapi"),
                Call::AttachDevice,
                Call::OpenDecoder(0),
            ]
        );
    }

    #[test]
    fn interleaved_audio_is_skipped() {
        let mut library = MockLibrary::with_video(0);
        library.packets = vec![
            MockPacket::video(1),
            MockPacket::audio(),
            MockPacket::video(2),
            MockPacket::audio(),
            MockPacket::audio(),
            MockPacket::video(3),
            MockPacket::audio(),
        ];
        library.decoder_delay = 1;
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        for expected in 1..=3u8 {
            session.get_frame(&mut buffer).unwrap();
            assert_eq!(buffer.data()[0], expected);
        }
        assert!(session.get_frame(&mut buffer).unwrap_err().is_eof());
        assert!(session.get_frame(&mut buffer).unwrap_err().is_eof());
        assert_eq!(session.state(), SessionState::Exhausted);
        assert_eq!(buffer.frames_written(), 3);
        assert_eq!(session.frame_index(), 5);
    }

    #[test]
    fn delivers_every_frame_then_eof() {
        for delay in 0..4 {
            let mut library = MockLibrary::with_video(7);
            library.decoder_delay = delay;
            let mut session = session(library);
            session.init().unwrap();

            let mut buffer = FrameBuffer::new();
            assert_eq!(
                drain(&mut session, &mut buffer),
                vec![1, 2, 3, 4, 5, 6, 7],
                "delay {delay}"
            );
            for _ in 0..3 {
                assert!(session.get_frame(&mut buffer).unwrap_err().is_eof());
            }
        }
    }

    #[test]
    fn flushing_is_one_way() {
        let mut library = MockLibrary::with_video(2);
        library.decoder_delay = 2;
        let calls = library.calls();
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        session.get_frame(&mut buffer).unwrap();
        assert_eq!(session.state(), SessionState::Draining);
        assert!(session.is_flushing());

        session.get_frame(&mut buffer).unwrap();
        assert!(session.is_flushing());
        assert!(session.get_frame(&mut buffer).unwrap_err().is_eof());
        assert!(session.get_frame(&mut buffer).unwrap_err().is_eof());
        assert!(session.is_flushing());

        let eofs = calls.borrow().iter().filter(|c| **c == Call::SendEof).count();
        assert_eq!(eofs, 1);
    }

    #[test]
    fn empty_input_ends_immediately() {
        let library = MockLibrary::with_video(0);
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        assert!(session.get_frame(&mut buffer).unwrap_err().is_eof());
        assert_eq!(session.state(), SessionState::Exhausted);
        assert!(!buffer.is_allocated());
    }

    #[test]
    fn buffer_allocated_once_from_first_frame() {
        let library = MockLibrary::with_video(4);
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        session.get_frame(&mut buffer).unwrap();
        let expected = PixelFormat::Nv12.buffer_size(64, 48).unwrap();
        assert_eq!(buffer.len(), expected);
        assert_eq!(buffer.len(), 64 * 48 * 3 / 2);
        assert_eq!(buffer.format(), Some(PixelFormat::Nv12));

        let ptr = buffer.data().as_ptr();
        while session.get_frame(&mut buffer).is_ok() {
            assert_eq!(buffer.data().as_ptr(), ptr);
            assert_eq!(buffer.len(), expected);
        }
        assert_eq!(buffer.frames_written(), 4);
    }

    #[test]
    fn hardware_frames_are_transferred() {
        let library = MockLibrary::with_video(2);
        let transfers = library.transfers();
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        drain(&mut session, &mut buffer);
        assert_eq!(transfers.get(), 2);
    }

    #[test]
    fn host_frames_are_used_directly() {
        let mut library = MockLibrary::with_video(2);
        library.frame_format = PixelFormat::Yuv420p;
        let transfers = library.transfers();
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        assert_eq!(drain(&mut session, &mut buffer), vec![1, 2]);
        assert_eq!(transfers.get(), 0);
        assert_eq!(buffer.format(), Some(PixelFormat::Yuv420p));
    }

    #[test]
    fn resolution_change_is_rejected() {
        let mut library = MockLibrary::with_video(3);
        library.resize_at = Some(2);
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        session.get_frame(&mut buffer).unwrap();
        let err = session.get_frame(&mut buffer).unwrap_err();
        assert!(matches!(err, Error::ImageCopy(_)), "{err}");
        assert_eq!(buffer.width(), 64);
        assert_eq!(buffer.data()[0], 1);
        assert_eq!(buffer.frames_written(), 1);
    }

    #[test]
    fn host_format_change_is_rejected() {
        let mut library = MockLibrary::with_video(3);
        library.software_at = Some(2);
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        session.get_frame(&mut buffer).unwrap();
        assert_eq!(buffer.format(), Some(PixelFormat::Nv12));

        // YUV420P packs to the same size as NV12 but with a different plane layout
        let err = session.get_frame(&mut buffer).unwrap_err();
        assert!(matches!(err, Error::ImageCopy(_)), "{err}");
        assert_eq!(buffer.format(), Some(PixelFormat::Nv12));
        assert_eq!(buffer.data()[0], 1);
        assert_eq!(buffer.frames_written(), 1);
    }

    #[test]
    fn full_decoder_keeps_packet_pending() {
        let mut library = MockLibrary::with_video(3);
        library.frames_per_packet = 2;
        library.decoder_capacity = 2;
        let calls = library.calls();
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        assert_eq!(
            drain(&mut session, &mut buffer),
            vec![10, 11, 20, 21, 30, 31]
        );
        let full = calls.borrow().iter().filter(|c| **c == Call::SendFull).count();
        assert!(full > 0);
    }

    #[test]
    fn get_frame_before_init() {
        let mut session = session(MockLibrary::with_video(1));
        let mut buffer = FrameBuffer::new();
        assert!(matches!(session.get_frame(&mut buffer), Err(Error::NotInitialized)));
    }

    #[test]
    fn unknown_accelerator_fails_before_io() {
        let library = MockLibrary::with_video(1);
        let calls = library.calls();
        let mut session = DecodeSession::with_library(
            SessionConfig::new("clip.mp4").with_accelerator("nonexistent"),
            library,
        );

        let err = session.init().unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedAccelerator { ref name } if name == "nonexistent"
        ));
        assert_eq!(
            *calls.borrow(),
            vec![Call::FindDeviceType("nonexistent".into())]
        );
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn input_open_failure() {
        let mut library = MockLibrary::with_video(1);
        library.fail_open_input = true;
        let mut session = session(library);
        assert!(matches!(session.init(), Err(Error::InputOpen { .. })));
    }

    #[test]
    fn no_video_stream_touches_no_decoder_state() {
        let mut library = MockLibrary::with_video(1);
        library.video_stream = None;
        let calls = library.calls();
        let mut session = session(library);

        assert!(matches!(session.init(), Err(Error::NoVideoStream)));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert_eq!(session.stream_index(), None);
        assert!(calls.borrow().iter().all(|c| !matches!(
            c,
            Call::AllocContext | Call::CreateDevice(_) | Call::OpenDecoder(_)
        )));
    }

    #[test]
    fn no_matching_hw_config_creates_no_device() {
        let mut library = MockLibrary::with_video(1);
        library.hw_configs = vec![
            HwConfig {
                methods: HwConfigMethods::HW_DEVICE_CTX,
                device_type: "cuda",
                pix_fmt: PixelFormat::Cuda,
            },
            HwConfig {
                methods: HwConfigMethods::INTERNAL,
                device_type: "vaapi",
                pix_fmt: PixelFormat::Vaapi,
            },
        ];
        let calls = library.calls();
        let mut session = session(library);

        let err = session.init().unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedHardwareConfig { ref decoder, ref device }
                if decoder == "mockvideo" && device == "vaapi"
        ));
        assert!(calls.borrow().iter().all(|c| !matches!(c, Call::CreateDevice(_))));
    }

    #[test]
    fn first_matching_hw_config_wins() {
        let mut library = MockLibrary::with_video(1);
        library.hw_configs = vec![
            HwConfig {
                methods: HwConfigMethods::HW_DEVICE_CTX,
                device_type: "vaapi",
                pix_fmt: PixelFormat::DrmPrime,
            },
            HwConfig {
                methods: HwConfigMethods::HW_DEVICE_CTX,
                device_type: "vaapi",
                pix_fmt: PixelFormat::Vaapi,
            },
        ];
        library.offered_formats = vec![PixelFormat::DrmPrime, PixelFormat::Vaapi];
        let calls = library.calls();
        let mut session = session(library);
        session.init().unwrap();

        assert!(calls
            .borrow()
            .contains(&Call::InstallFormatNegotiation(PixelFormat::DrmPrime)));
    }

    #[test]
    fn context_allocation_failure() {
        let mut library = MockLibrary::with_video(1);
        library.fail_alloc = true;
        let mut session = session(library);
        assert!(matches!(session.init(), Err(Error::OutOfMemory(_))));
    }

    #[test]
    fn parameter_binding_failure() {
        let mut library = MockLibrary::with_video(1);
        library.fail_bind = true;
        let calls = library.calls();
        let mut session = session(library);
        assert!(matches!(session.init(), Err(Error::ParameterBinding(_))));
        assert!(calls.borrow().iter().all(|c| !matches!(c, Call::CreateDevice(_))));
    }

    #[test]
    fn device_creation_failure() {
        let mut library = MockLibrary::with_video(1);
        library.fail_device = true;
        let calls = library.calls();
        let mut session = session(library);
        assert!(matches!(session.init(), Err(Error::HardwareDeviceCreation { .. })));
        assert!(calls.borrow().iter().all(|c| !matches!(c, Call::OpenDecoder(_))));
    }

    #[test]
    fn negotiation_without_hw_format_fails_open() {
        let mut library = MockLibrary::with_video(1);
        library.offered_formats = vec![PixelFormat::Yuv420p, PixelFormat::Nv12];
        let mut session = session(library);
        assert!(matches!(session.init(), Err(Error::NoMatchingPixelFormat(_))));
        assert_eq!(session.state(), SessionState::Uninitialized);
    }

    #[test]
    fn negotiation_failure_on_first_submit_is_reported() {
        let mut library = MockLibrary::with_video(3);
        library.offered_formats = vec![PixelFormat::Yuv420p, PixelFormat::Nv12];
        library.negotiate_on_submit = true;
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        for _ in 0..2 {
            assert!(matches!(
                session.get_frame(&mut buffer),
                Err(Error::NoMatchingPixelFormat(_))
            ));
        }
        assert!(!buffer.is_allocated());
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn negotiation_on_first_submit_decodes() {
        let mut library = MockLibrary::with_video(3);
        library.negotiate_on_submit = true;
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        assert_eq!(drain(&mut session, &mut buffer), vec![1, 2, 3]);
    }

    #[test]
    fn decode_submit_error_propagates() {
        let mut library = MockLibrary::with_video(3);
        library.fail_send_at = Some(2);
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        session.get_frame(&mut buffer).unwrap();
        assert!(matches!(session.get_frame(&mut buffer), Err(Error::DecodeSubmit(_))));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn frame_receive_error_propagates() {
        let mut library = MockLibrary::with_video(3);
        library.fail_receive = true;
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        assert!(matches!(session.get_frame(&mut buffer), Err(Error::FrameReceive(_))));
    }

    #[test]
    fn reinit_resets_session() {
        let library = MockLibrary::with_video(2);
        let released = library.released();
        let mut session = session(library);
        session.init().unwrap();

        let mut buffer = FrameBuffer::new();
        assert_eq!(drain(&mut session, &mut buffer), vec![1, 2]);
        assert!(session.is_flushing());

        session.init().unwrap();
        assert_eq!(released.get(), 1);
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.frame_index(), 0);
        assert!(!session.is_flushing());
        assert_eq!(drain(&mut session, &mut buffer), vec![1, 2]);

        drop(session);
        assert_eq!(released.get(), 2);
    }
}
