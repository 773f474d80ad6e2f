use embedded_graphics::mono_font::{ascii::FONT_8X13, MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use embedded_hal::{blocking::spi::Write as SpiWrite, digital::v2::OutputPin};

const WIDTH: usize = 400;
const HEIGHT: usize = 240;
const WIDTH_BYTES: usize = WIDTH.div_ceil(8);
const HEIGHT_BYTES: usize = HEIGHT.div_ceil(8);

const UPDATE_BIT: u8 = 0b0000_0001;
const VCOM_BIT: u8 = 0b0000_0010;
const CLEAR_BIT: u8 = 0b0000_0100;

/// Text-row output used by the UI.
pub trait Renderer {
    type Error;

    /// Draws `text` with its top-left corner at `(x, y)`, replacing whatever
    /// the glyph cells showed before.
    fn write_row(&mut self, x: i32, y: i32, text: &str) -> core::result::Result<(), Self::Error>;
    fn clear_screen(&mut self) -> core::result::Result<(), Self::Error>;
    /// Pushes buffered changes to the panel.
    fn flush(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

fn row_style() -> MonoTextStyle<'static, BinaryColor> {
    MonoTextStyleBuilder::new()
        .font(&FONT_8X13)
        .text_color(BinaryColor::On)
        .background_color(BinaryColor::Off)
        .build()
}

/// Draws one row of text on any monochrome target.
pub fn draw_row<D>(target: &mut D, x: i32, y: i32, text: &str) -> core::result::Result<(), D::Error>
where
    D: DrawTarget<Color = BinaryColor>,
{
    Text::with_baseline(text, Point::new(x, y), row_style(), Baseline::Top).draw(target)?;
    Ok(())
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    #[error("SPI write failed")]
    Spi,
    #[error("GPIO failed")]
    Gpio,
}

type Result<T> = core::result::Result<T, DisplayError>;

struct SpiTransaction<'a, SPI, CS> {
    spi: &'a mut SPI,
    cs: &'a mut CS,
}

impl<'a, SPI, CS> SpiTransaction<'a, SPI, CS>
where
    SPI: SpiWrite<u8>,
    CS: OutputPin,
{
    fn start(disp: &'a mut SharpMemDisplayDriver<SPI, CS>, command: u8) -> Result<Self> {
        disp.vcom = !disp.vcom;
        let vcom = if disp.vcom { VCOM_BIT } else { 0 };
        disp.cs.set_high().map_err(|_| DisplayError::Gpio)?;
        let mut trn = Self {
            spi: &mut disp.spi,
            cs: &mut disp.cs,
        };
        if let Err(e) = trn.send(&[command | vcom]) {
            // The SPI error is the one worth reporting
            let _ = trn.finish();
            return Err(e);
        }
        Ok(trn)
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.spi.write(data).map_err(|_| DisplayError::Spi)
    }

    fn finish(self) -> Result<()> {
        self.cs.set_low().map_err(|_| DisplayError::Gpio)
    }
}

/// Command layer of a Sharp memory LCD; chip select is active high.
pub struct SharpMemDisplayDriver<SPI, CS> {
    spi: SPI,
    cs: CS,
    vcom: bool,
}

impl<SPI, CS> SharpMemDisplayDriver<SPI, CS>
where
    SPI: SpiWrite<u8>,
    CS: OutputPin,
{
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self {
            spi,
            cs,
            vcom: false,
        }
    }

    fn start(&mut self, command: u8) -> Result<SpiTransaction<SPI, CS>> {
        SpiTransaction::start(self, command)
    }

    pub fn clear(&mut self) -> Result<()> {
        let mut trn = self.start(CLEAR_BIT)?;
        let sent = trn.send(&[0x00]);
        let released = trn.finish();
        sent.and(released)
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}

/// Frame buffer in front of the driver. Only lines touched since the last
/// flush are sent.
pub struct SharpMemDisplay<SPI, CS> {
    buf: [[u8; WIDTH_BYTES]; HEIGHT],
    dirty: [u8; HEIGHT_BYTES],
    dirty_any: bool,
    driver: SharpMemDisplayDriver<SPI, CS>,
}

impl<SPI, CS> SharpMemDisplay<SPI, CS>
where
    SPI: SpiWrite<u8>,
    CS: OutputPin,
{
    pub fn new(spi: SPI, cs: CS) -> Self {
        Self {
            buf: [[0xFF; WIDTH_BYTES]; HEIGHT],
            dirty: [0; HEIGHT_BYTES],
            dirty_any: false,
            driver: SharpMemDisplayDriver::new(spi, cs),
        }
    }

    pub fn draw_pixel(&mut self, x: usize, y: usize, state: bool) {
        if x >= WIDTH || y >= HEIGHT {
            return;
        }
        if state {
            self.buf[y][x / 8] |= 1u8 << (x % 8);
        } else {
            self.buf[y][x / 8] &= !(1u8 << (x % 8));
        }
        self.dirty[y / 8] |= 1u8 << (y % 8);
        self.dirty_any = true;
    }

    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty_any {
            return Ok(());
        }
        let dirty = self.dirty;
        let line_dirty = |y: usize| dirty[y / 8] & (1u8 << (y % 8)) != 0;

        let mut trn = self.driver.start(UPDATE_BIT)?;
        let sent = self
            .buf
            .iter()
            .enumerate()
            .filter(|(y, _)| line_dirty(*y))
            .try_for_each(|(y, row)| {
                trn.send(&[y as u8])?; // address
                trn.send(row)?;
                trn.send(&[0x00]) // line trailer
            })
            .and_then(|()| trn.send(&[0x00])); // termination
        let released = trn.finish();
        sent.and(released)?;

        self.dirty = [0; HEIGHT_BYTES];
        self.dirty_any = false;
        Ok(())
    }

    /// Blanks the panel and the buffer.
    pub fn clear(&mut self) -> Result<()> {
        self.driver.clear()?;
        self.buf = [[0xFF; WIDTH_BYTES]; HEIGHT];
        self.dirty = [0; HEIGHT_BYTES];
        self.dirty_any = false;
        Ok(())
    }

    pub fn release(self) -> (SPI, CS) {
        self.driver.release()
    }
}

impl<SPI, CS> DrawTarget for SharpMemDisplay<SPI, CS>
where
    SPI: SpiWrite<u8>,
    CS: OutputPin,
{
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> core::result::Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(pos, color) in pixels {
            let (Ok(x), Ok(y)) = (usize::try_from(pos.x), usize::try_from(pos.y)) else {
                continue;
            };
            // Set bits are white on this panel
            self.draw_pixel(x, y, color == BinaryColor::Off);
        }
        Ok(())
    }
}

impl<SPI, CS> OriginDimensions for SharpMemDisplay<SPI, CS> {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}

impl<SPI, CS> Renderer for SharpMemDisplay<SPI, CS>
where
    SPI: SpiWrite<u8>,
    CS: OutputPin,
{
    type Error = DisplayError;

    fn write_row(&mut self, x: i32, y: i32, text: &str) -> Result<()> {
        match draw_row(self, x, y, text) {
            Ok(()) => Ok(()),
            Err(never) => match never {},
        }
    }

    fn clear_screen(&mut self) -> Result<()> {
        self.clear()
    }

    fn flush(&mut self) -> Result<()> {
        SharpMemDisplay::flush(self)
    }
}
