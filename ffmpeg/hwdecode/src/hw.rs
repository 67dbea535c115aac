/*!
    Hardware configuration selection and pixel format negotiation.
*/

use std::{cell::Cell, fmt, ops::BitOr};

use ffmpeg_types::{Error, Result};

/**
    Setup methods a hardware configuration supports.

    Bit values match FFmpeg's `AV_CODEC_HW_CONFIG_METHOD_*` flags.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct HwConfigMethods(u32);

impl HwConfigMethods {
    /// The decoder accepts a hardware device context.
    pub const HW_DEVICE_CTX: Self = Self(0x01);
    /// The decoder accepts a hardware frames context.
    pub const HW_FRAMES_CTX: Self = Self(0x02);
    /// The decoder sets itself up internally.
    pub const INTERNAL: Self = Self(0x04);
    /// The decoder needs codec-specific setup.
    pub const AD_HOC: Self = Self(0x08);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for HwConfigMethods {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/**
    One hardware configuration advertised by a decoder.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HwConfig<D, F> {
    pub methods: HwConfigMethods,
    pub device_type: D,
    /// Pixel format of frames decoded with this configuration.
    pub pix_fmt: F,
}

/**
    Select the first configuration that takes a device context of type `device`.

    Order is whatever the library advertised, first match wins.
*/
pub fn select_hw_config<D, F, I>(configs: I, device: D) -> Option<HwConfig<D, F>>
where
    D: PartialEq,
    I: IntoIterator<Item = HwConfig<D, F>>,
{
    configs.into_iter().find(|config| {
        config.methods.contains(HwConfigMethods::HW_DEVICE_CTX) && config.device_type == device
    })
}

/**
    Pick the hardware format out of the formats a decoder offers.

    Returns `None` if the decoder does not offer it.
*/
pub fn negotiate_format<F>(candidates: &[F], hw_format: F) -> Option<F>
where
    F: Copy + PartialEq,
{
    candidates.iter().copied().find(|format| *format == hw_format)
}

/**
    Output format negotiation state for one decoder.

    Decoders may negotiate when they are opened or only once they parse the
    first sequence header, and a failure in the second case does not always
    fail the call that triggered it. A failure is therefore latched here and
    every later [`FormatNegotiation::check`] reports it.
*/
#[derive(Debug)]
pub struct FormatNegotiation<F> {
    hw_format: F,
    failed: Cell<bool>,
}

impl<F: Copy + PartialEq + fmt::Debug> FormatNegotiation<F> {
    pub fn new(hw_format: F) -> Self {
        Self {
            hw_format,
            failed: Cell::new(false),
        }
    }

    pub fn hw_format(&self) -> F {
        self.hw_format
    }

    /**
        Negotiate against the formats the decoder offers, latching a failure.
    */
    pub fn negotiate(&self, candidates: &[F]) -> Option<F> {
        let format = negotiate_format(candidates, self.hw_format);
        if format.is_none() {
            self.failed.set(true);
        }
        format
    }

    pub fn has_failed(&self) -> bool {
        self.failed.get()
    }

    /**
        Returns [`Error::NoMatchingPixelFormat`] once any negotiation has failed.
    */
    pub fn check(&self) -> Result<()> {
        if self.has_failed() {
            return Err(Error::NoMatchingPixelFormat(format!(
                "decoder does not offer {:?}",
                self.hw_format
            )));
        }
        Ok(())
    }
}
