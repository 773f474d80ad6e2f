#![no_main]
#![no_std]

use gnss_tracker as _;
use gnss_tracker::{
    battery::BatteryAdc,
    display::SharpMemDisplay,
    schedule::Uptime,
    tracker::Power,
    waypoints::{layout::IMAGE_LEN, Storage},
    Config, Hardware, Tracker,
};

use core::convert::Infallible;
use cortex_m::peripheral::{NVIC, SCB};
use defmt::{info, trace, warn};
use embedded_hal::{adc::OneShot as _, serial};
use hal::{
    adc::ADC,
    delay::Delay,
    flash::{FlashPage, WriteErase, CR, KEYR, SR},
    gpio::{Analog, Edge, Input, PullUp, PA1, PA4, PA5, PA6, PA7, PA8},
    pac::Interrupt,
};
use rtic_monotonics::{create_systick_token, systick::Systick, Monotonic as _};
use stm32l4xx_hal::{
    self as hal,
    gpio::{Alternate, Output, PushPull, PA2, PA3},
    hal::spi::{Mode, Phase, Polarity},
    pac::{EXTI, LPUART1, SPI1},
    prelude::*,
    rcc::{ClockSecuritySystem, CrystalBypass},
    serial::{Config as SerialConfig, Serial},
    spi::Spi,
};
use tinyvec::ArrayVec;

type Display = SharpMemDisplay<
    Spi<
        SPI1,
        (
            PA5<Alternate<PushPull, 5>>,
            PA6<Alternate<PushPull, 5>>,
            PA7<Alternate<PushPull, 5>>,
        ),
    >,
    PA4<Output<PushPull>>,
>;

type LpUart1 = Serial<LPUART1, (PA2<Alternate<PushPull, 8>>, PA3<Alternate<PushPull, 8>>)>;

type Button = PA8<Input<PullUp>>;

type Board = Hardware<Button, RxQueue, BatteryPin, Display, Sleep>;

const UART_RX_BUFSIZE: usize = 256;

/// SysTick runs at 100 Hz
const MS_PER_TICK: u64 = 10;
/// EXTI line of the button on PA8
const BUTTON_LINE: u32 = 8;

/// Last 2 KiB page of the 256 KiB part, kept out of the image by memory.x
const STORE_PAGE: FlashPage = FlashPage(127);
/// Image rounded up to whole double words
const STORE_LEN: usize = IMAGE_LEN.next_multiple_of(8);

/// Bytes moved out of the UART interrupt's buffer, read back one at a time.
#[derive(Default)]
struct RxQueue {
    bytes: ArrayVec<[u8; UART_RX_BUFSIZE]>,
    pos: usize,
}

impl RxQueue {
    fn refill(&mut self, bytes: ArrayVec<[u8; UART_RX_BUFSIZE]>) {
        self.bytes = bytes;
        self.pos = 0;
    }
}

impl serial::Read<u8> for RxQueue {
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Infallible> {
        let b = *self.bytes.get(self.pos).ok_or(nb::Error::WouldBlock)?;
        self.pos += 1;
        Ok(b)
    }
}

struct BatteryPin {
    adc: ADC,
    pin: PA1<Analog>,
}

impl BatteryAdc for BatteryPin {
    fn read_raw(&mut self) -> u16 {
        self.adc.read(&mut self.pin).unwrap_or_else(|_| {
            warn!("battery ADC read failed");
            0
        })
    }
}

struct Sleep {
    scb: SCB,
    exti: EXTI,
}

impl Power for Sleep {
    fn wait_for_interrupt(&mut self) {
        // SysTick keeps running, so this returns at least every tick
        cortex_m::asm::wfi();
    }

    fn power_off(&mut self) {
        cortex_m::interrupt::disable();
        // Drop the edge of the press that picked this item, then arm the line
        // SAFETY: plain bit masks for line 8 of PR1/IMR1
        self.exti
            .pr1
            .write(|w| unsafe { w.bits(1 << BUTTON_LINE) });
        self.exti
            .imr1
            .modify(|r, w| unsafe { w.bits(r.bits() | (1 << BUTTON_LINE)) });
        NVIC::unpend(Interrupt::EXTI9_5);
        // SAFETY: PRIMASK is set, the pending line only wakes the core and
        // no handler runs
        unsafe { NVIC::unmask(Interrupt::EXTI9_5) };
        self.scb.set_sleepdeep();
        cortex_m::asm::dsb();
        cortex_m::asm::wfi();
        SCB::sys_reset();
    }
}

#[derive(Debug, defmt::Format)]
enum FlashError {
    OutOfRange,
    Program,
}

/// Waypoint image in one flash page, staged in RAM until committed.
struct FlashStorage {
    keyr: KEYR,
    sr: SR,
    cr: CR,
    image: [u8; STORE_LEN],
}

impl FlashStorage {
    fn new(keyr: KEYR, sr: SR, cr: CR) -> Self {
        let mut image = [0u8; STORE_LEN];
        let base = STORE_PAGE.to_address() as *const u8;
        for (i, b) in image.iter_mut().enumerate() {
            // SAFETY: the page lies inside memory mapped main flash
            *b = unsafe { core::ptr::read_volatile(base.add(i)) };
        }
        Self { keyr, sr, cr, image }
    }
}

impl Storage for FlashStorage {
    type Error = FlashError;

    fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        let src = self
            .image
            .get(offset..offset + buf.len())
            .ok_or(FlashError::OutOfRange)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), FlashError> {
        let dst = self
            .image
            .get_mut(offset..offset + data.len())
            .ok_or(FlashError::OutOfRange)?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), FlashError> {
        let mut flash = self
            .keyr
            .unlock_flash(&mut self.sr, &mut self.cr)
            .map_err(|_| FlashError::Program)?;
        flash
            .erase_page(STORE_PAGE)
            .map_err(|_| FlashError::Program)?;
        flash
            .write(STORE_PAGE.to_address(), &self.image)
            .map_err(|_| FlashError::Program)
    }
}

#[rtic::app(
    device = stm32l4xx_hal::pac,
    dispatchers = [EXTI2],
)]
mod app {
    use super::*;

    #[shared]
    struct Shared {
        rx: ArrayVec<[u8; UART_RX_BUFSIZE]>,
    }

    #[local]
    struct Local {
        uart: LpUart1,
        tracker: Tracker<FlashStorage>,
        board: Board,
    }

    #[init]
    fn init(mut cx: init::Context) -> (Shared, Local) {
        trace!("init enter");

        let mut flash = cx.device.FLASH.constrain();
        let mut rcc = cx.device.RCC.constrain();
        let mut pwr = cx.device.PWR.constrain(&mut rcc.apb1r1);
        let clocks = rcc
            .cfgr
            .lse(CrystalBypass::Disable, ClockSecuritySystem::Disable)
            .freeze(&mut flash.acr, &mut pwr);

        let mut gpioa = cx.device.GPIOA.split(&mut rcc.ahb2);

        let mut delay = Delay::new(cx.core.SYST, clocks);
        let pa1 = gpioa.pa1.into_analog(&mut gpioa.moder, &mut gpioa.pupdr);
        let adc = ADC::new(
            cx.device.ADC1,
            cx.device.ADC_COMMON,
            &mut rcc.ahb2,
            &mut rcc.ccipr,
            &mut delay,
        );
        cx.core.SYST = delay.free();

        Systick::start(cx.core.SYST, clocks.sysclk().raw(), create_systick_token!());

        // Display on SPI1, chip select is active high
        let mut cs = gpioa
            .pa4
            .into_push_pull_output(&mut gpioa.moder, &mut gpioa.otyper);
        cs.set_low();
        let sck = gpioa
            .pa5
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let miso = gpioa
            .pa6
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let mosi = gpioa
            .pa7
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let spi1 = Spi::spi1(
            cx.device.SPI1,
            (sck, miso, mosi),
            Mode {
                phase: Phase::CaptureOnFirstTransition,
                polarity: Polarity::IdleLow,
            },
            false,
            2.MHz(),
            clocks,
            &mut rcc.apb2,
        );

        // Receiver talks NMEA at its default rate
        let tx = gpioa
            .pa2
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let rx = gpioa
            .pa3
            .into_alternate(&mut gpioa.moder, &mut gpioa.otyper, &mut gpioa.afrl);
        let mut uart = Serial::lpuart1(
            cx.device.LPUART1,
            (tx, rx),
            SerialConfig::default().baudrate(9600.bps()),
            clocks,
            &mut rcc.apb1r2,
        );
        uart.listen(hal::serial::Event::Rxne);

        // Only used to leave deep sleep; the line is armed on the way down
        let mut button = gpioa
            .pa8
            .into_pull_up_input(&mut gpioa.moder, &mut gpioa.pupdr);
        button.make_interrupt_source(&mut cx.device.SYSCFG, &mut rcc.apb2);
        button.trigger_on_edge(&mut cx.device.EXTI, Edge::Falling);

        let storage = FlashStorage::new(flash.keyr, flash.sr, flash.cr);
        let tracker = Tracker::new(Config::default(), storage);

        let board = Hardware {
            button,
            gnss: RxQueue::default(),
            adc: BatteryPin { adc, pin: pa1 },
            display: SharpMemDisplay::new(spi1, cs),
            power: Sleep {
                scb: cx.core.SCB,
                exti: cx.device.EXTI,
            },
        };

        info!(
            "gnss-tracker v{} up, {} waypoints stored",
            env!("CARGO_PKG_VERSION"),
            tracker.waypoints().count_set()
        );
        trace!("init exit");
        (
            Shared {
                rx: ArrayVec::new(),
            },
            Local {
                uart,
                tracker,
                board,
            },
        )
    }

    #[idle(shared = [rx], local = [tracker, board, uptime: Uptime = Uptime::new(MS_PER_TICK)])]
    fn idle(mut cx: idle::Context) -> ! {
        trace!("idle enter");

        loop {
            let bytes = cx.shared.rx.lock(core::mem::take);
            cx.local.board.gnss.refill(bytes);

            let now_ms = cx.local.uptime.update(Systick::now().ticks());
            cx.local.tracker.poll(now_ms, cx.local.board);

            // Next SysTick or UART byte
            cortex_m::asm::wfi();
        }
    }

    // Move received bytes into the buffer drained by idle
    #[task(binds = LPUART1, priority = 10, shared = [rx], local = [uart])]
    fn on_uart(mut cx: on_uart::Context) {
        let uart = cx.local.uart;
        cx.shared.rx.lock(|rx| {
            while let Ok(b) = serial::Read::read(uart) {
                // Dropped when idle falls behind
                let _ = rx.try_push(b);
            }
        });
    }
}
