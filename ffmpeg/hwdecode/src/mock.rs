/*!
    In-memory codec library for exercising decode sessions without FFmpeg.
*/

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    path::{Path, PathBuf},
    rc::Rc,
};

use ffmpeg_types::{Error, PixelFormat, Result};

use crate::{
    backend::{
        CodecLibrary, CompressedUnit, DecodedFrame, FrameDecoder, MediaInput, Received, SendStatus,
    },
    hw::{FormatNegotiation, HwConfig, HwConfigMethods},
};

const VIDEO_STREAM: usize = 0;
const AUDIO_STREAM: usize = 1;
const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    FindDeviceType(String),
    OpenInput,
    FindBestVideoStream,
    HwConfigs,
    AllocContext,
    BindParameters(usize),
    InstallFormatNegotiation(PixelFormat),
    CreateDevice(&'static str),
    AttachDevice,
    OpenDecoder(usize),
    SendFull,
    SendEof,
}

type CallLog = Rc<RefCell<Vec<Call>>>;

#[derive(Clone, Copy, Debug)]
pub(crate) struct MockPacket {
    stream: usize,
    id: u8,
}

impl MockPacket {
    pub(crate) fn video(id: u8) -> Self {
        Self {
            stream: VIDEO_STREAM,
            id,
        }
    }

    pub(crate) fn audio() -> Self {
        Self {
            stream: AUDIO_STREAM,
            id: 0,
        }
    }
}

impl CompressedUnit for MockPacket {
    fn stream_index(&self) -> usize {
        self.stream
    }
}

/**
    Knobs for the simulated library. Defaults describe a VAAPI-capable
    decoder producing 64x48 hardware frames that transfer to NV12.
*/
pub(crate) struct MockLibrary {
    pub devices: Vec<&'static str>,
    pub packets: Vec<MockPacket>,
    pub video_stream: Option<usize>,
    pub hw_configs: Vec<HwConfig<&'static str, PixelFormat>>,
    pub offered_formats: Vec<PixelFormat>,
    pub frame_format: PixelFormat,
    /// Frames the decoder holds back until it is flushed.
    pub decoder_delay: usize,
    /// Queued frames at which the decoder reports itself full.
    pub decoder_capacity: usize,
    pub frames_per_packet: u8,
    /// Frame id from which frames come out at a different size.
    pub resize_at: Option<u8>,
    /// Frame id from which the decoder falls back to YUV420P host frames.
    pub software_at: Option<u8>,
    /// Negotiate the output format on the first submission instead of at
    /// open, like H.264 does once it parses the first SPS.
    pub negotiate_on_submit: bool,
    /// Video packet ordinal (1-based) whose submission fails.
    pub fail_send_at: Option<usize>,
    pub fail_receive: bool,
    pub fail_open_input: bool,
    pub fail_alloc: bool,
    pub fail_bind: bool,
    pub fail_device: bool,
    calls: CallLog,
    transfers: Rc<Cell<usize>>,
    released: Rc<Cell<usize>>,
}

impl MockLibrary {
    pub(crate) fn with_video(frames: u8) -> Self {
        Self {
            devices: vec!["vaapi", "cuda"],
            packets: (1..=frames).map(MockPacket::video).collect(),
            video_stream: Some(VIDEO_STREAM),
            hw_configs: vec![HwConfig {
                methods: HwConfigMethods::HW_DEVICE_CTX,
                device_type: "vaapi",
                pix_fmt: PixelFormat::Vaapi,
            }],
            offered_formats: vec![PixelFormat::Vaapi, PixelFormat::Yuv420p],
            frame_format: PixelFormat::Vaapi,
            decoder_delay: 0,
            decoder_capacity: usize::MAX,
            frames_per_packet: 1,
            resize_at: None,
            software_at: None,
            negotiate_on_submit: false,
            fail_send_at: None,
            fail_receive: false,
            fail_open_input: false,
            fail_alloc: false,
            fail_bind: false,
            fail_device: false,
            calls: CallLog::default(),
            transfers: Rc::default(),
            released: Rc::default(),
        }
    }

    pub(crate) fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }

    /// Count of device-to-host transfers performed.
    pub(crate) fn transfers(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.transfers)
    }

    /// Count of hardware devices released.
    pub(crate) fn released(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.released)
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

pub(crate) struct MockInput {
    packets: VecDeque<MockPacket>,
}

impl MediaInput for MockInput {
    type Packet = MockPacket;

    fn read_packet(&mut self) -> Option<MockPacket> {
        self.packets.pop_front()
    }
}

pub(crate) struct MockContext {
    negotiation: Option<FormatNegotiation<PixelFormat>>,
    device_attached: bool,
}

pub(crate) struct MockDevice {
    released: Rc<Cell<usize>>,
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.released.set(self.released.get() + 1);
    }
}

pub(crate) struct MockFrame {
    id: u8,
    format: PixelFormat,
    width: u32,
    height: u32,
    transfers: Rc<Cell<usize>>,
}

impl DecodedFrame for MockFrame {
    type Format = PixelFormat;

    fn format(&self) -> PixelFormat {
        self.format
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> Option<PixelFormat> {
        (!self.format.is_hardware()).then_some(self.format)
    }

    fn transfer_to_host(&self) -> Result<Self> {
        self.transfers.set(self.transfers.get() + 1);
        Ok(Self {
            format: PixelFormat::Nv12,
            transfers: Rc::clone(&self.transfers),
            ..*self
        })
    }

    fn buffer_size(&self) -> Result<usize> {
        self.format
            .buffer_size(self.width, self.height)
            .ok_or_else(|| Error::ImageCopy(format!("{:?} has no host layout", self.format)))
    }

    fn copy_to_buffer(&self, dst: &mut [u8]) -> Result<usize> {
        let size = self.buffer_size()?;
        if dst.len() < size {
            return Err(Error::ImageCopy("destination too small".into()));
        }
        dst[..size].fill(self.id);
        Ok(size)
    }
}

pub(crate) struct MockDecoder {
    queue: VecDeque<MockFrame>,
    eof_sent: bool,
    sent: usize,
    delay: usize,
    capacity: usize,
    frames_per_packet: u8,
    frame_format: PixelFormat,
    resize_at: Option<u8>,
    software_at: Option<u8>,
    negotiation: FormatNegotiation<PixelFormat>,
    /// Formats still to be offered at the first submission.
    pending_offer: Option<Vec<PixelFormat>>,
    fail_send_at: Option<usize>,
    fail_receive: bool,
    calls: CallLog,
    transfers: Rc<Cell<usize>>,
}

impl MockDecoder {
    fn frame(&self, id: u8) -> MockFrame {
        let resized = self.resize_at.is_some_and(|at| id >= at);
        let (width, height) = if resized {
            (WIDTH / 2, HEIGHT / 2)
        } else {
            (WIDTH, HEIGHT)
        };
        let format = if self.software_at.is_some_and(|at| id >= at) {
            PixelFormat::Yuv420p
        } else {
            self.frame_format
        };
        MockFrame {
            id,
            format,
            width,
            height,
            transfers: Rc::clone(&self.transfers),
        }
    }
}

impl FrameDecoder for MockDecoder {
    type Packet = MockPacket;
    type Format = PixelFormat;
    type Frame = MockFrame;

    fn send_packet(&mut self, packet: &MockPacket) -> Result<SendStatus> {
        if let Some(offered) = self.pending_offer.take() {
            // Rejected silently, the way libavcodec drops a bad slice header
            let _ = self.negotiation.negotiate(&offered);
        }
        self.negotiation.check()?;

        if self.queue.len() >= self.capacity {
            self.calls.borrow_mut().push(Call::SendFull);
            return Ok(SendStatus::Full);
        }

        self.sent += 1;
        if self.fail_send_at == Some(self.sent) {
            return Err(Error::DecodeSubmit("Invalid data found when processing input".into()));
        }

        if self.frames_per_packet == 1 {
            let frame = self.frame(packet.id);
            self.queue.push_back(frame);
        } else {
            for k in 0..self.frames_per_packet {
                let frame = self.frame(packet.id * 10 + k);
                self.queue.push_back(frame);
            }
        }
        Ok(SendStatus::Accepted)
    }

    fn send_eof(&mut self) -> Result<()> {
        self.calls.borrow_mut().push(Call::SendEof);
        self.negotiation.check()?;
        self.eof_sent = true;
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Received<MockFrame>> {
        self.negotiation.check()?;
        if self.fail_receive {
            return Err(Error::FrameReceive("Generic error in an external library".into()));
        }

        if self.eof_sent {
            return Ok(match self.queue.pop_front() {
                Some(frame) => Received::Frame(frame),
                None => Received::Exhausted,
            });
        }

        if self.queue.len() > self.delay {
            if let Some(frame) = self.queue.pop_front() {
                return Ok(Received::Frame(frame));
            }
        }
        Ok(Received::NeedsInput)
    }
}

impl CodecLibrary for MockLibrary {
    type DeviceType = &'static str;
    type Format = PixelFormat;
    type Codec = &'static str;
    type Input = MockInput;
    type Context = MockContext;
    type Device = MockDevice;
    type Decoder = MockDecoder;

    fn find_device_type(&self, name: &str) -> Option<&'static str> {
        self.record(Call::FindDeviceType(name.to_owned()));
        self.devices.iter().copied().find(|device| *device == name)
    }

    fn open_input(&self, path: &Path) -> Result<MockInput> {
        self.record(Call::OpenInput);
        if self.fail_open_input {
            return Err(Error::InputOpen {
                path: PathBuf::from(path),
                message: "No such file or directory".into(),
            });
        }
        Ok(MockInput {
            packets: self.packets.iter().copied().collect(),
        })
    }

    fn find_best_video_stream(&self, _input: &MockInput) -> Option<(usize, &'static str)> {
        self.record(Call::FindBestVideoStream);
        self.video_stream.map(|index| (index, "mockvideo"))
    }

    fn codec_name(&self, codec: &&'static str) -> String {
        (*codec).to_owned()
    }

    fn hw_configs(&self, _codec: &&'static str) -> Vec<HwConfig<&'static str, PixelFormat>> {
        self.record(Call::HwConfigs);
        self.hw_configs.clone()
    }

    fn alloc_context(&self, _codec: &&'static str) -> Result<MockContext> {
        self.record(Call::AllocContext);
        if self.fail_alloc {
            return Err(Error::OutOfMemory("decoder context"));
        }
        Ok(MockContext {
            negotiation: None,
            device_attached: false,
        })
    }

    fn bind_parameters(
        &self,
        _context: &mut MockContext,
        _input: &MockInput,
        stream: usize,
    ) -> Result<()> {
        self.record(Call::BindParameters(stream));
        if self.fail_bind {
            return Err(Error::ParameterBinding("Invalid argument".into()));
        }
        Ok(())
    }

    fn install_format_negotiation(&self, context: &mut MockContext, hw_format: PixelFormat) {
        self.record(Call::InstallFormatNegotiation(hw_format));
        context.negotiation = Some(FormatNegotiation::new(hw_format));
    }

    fn create_device(&self, device_type: &'static str) -> Result<MockDevice> {
        self.record(Call::CreateDevice(device_type));
        if self.fail_device {
            return Err(Error::HardwareDeviceCreation {
                device: device_type.to_owned(),
                message: "Input/output error".into(),
            });
        }
        Ok(MockDevice {
            released: Rc::clone(&self.released),
        })
    }

    fn attach_device(&self, context: &mut MockContext, _device: &MockDevice) {
        self.record(Call::AttachDevice);
        context.device_attached = true;
    }

    fn open_decoder(
        &self,
        context: MockContext,
        _codec: &&'static str,
        stream: usize,
    ) -> Result<MockDecoder> {
        self.record(Call::OpenDecoder(stream));
        if !context.device_attached {
            return Err(Error::CodecOpen {
                stream,
                message: "no hardware device attached".into(),
            });
        }
        let Some(negotiation) = context.negotiation else {
            return Err(Error::CodecOpen {
                stream,
                message: "no format negotiation installed".into(),
            });
        };
        let pending_offer = if self.negotiate_on_submit {
            Some(self.offered_formats.clone())
        } else {
            let _ = negotiation.negotiate(&self.offered_formats);
            negotiation.check()?;
            None
        };

        Ok(MockDecoder {
            queue: VecDeque::new(),
            eof_sent: false,
            sent: 0,
            delay: self.decoder_delay,
            capacity: self.decoder_capacity,
            frames_per_packet: self.frames_per_packet,
            frame_format: self.frame_format,
            resize_at: self.resize_at,
            software_at: self.software_at,
            negotiation,
            pending_offer,
            fail_send_at: self.fail_send_at,
            fail_receive: self.fail_receive,
            calls: Rc::clone(&self.calls),
            transfers: Rc::clone(&self.transfers),
        })
    }
}
