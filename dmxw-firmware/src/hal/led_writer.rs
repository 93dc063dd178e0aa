// SmartLED Writer Trait und RMT-Implementierung
//
// Abstrahiert den Zugriff auf RGB LEDs (WS2812/Neopixel), damit die
// Effekt-Logik im LED-Task nicht an RMT gebunden ist.

use esp_hal::Blocking;
use esp_hal::gpio::AnyPin;
use esp_hal::rmt::{PulseCode, Rmt};
use esp_hal::time::Rate;
use esp_hal_smartled::SmartLedsAdapter;
use rgb::RGB8;
use smart_leds_trait::SmartLedsWrite;

use crate::config::PIXEL_MAX_LEN;

/// Fehler-Typ für LED-Schreiboperationen
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum LedError {
    WriteFailed,
}

/// Trait für LED-Writer
pub trait SmartLedWriter {
    /// Anzahl LEDs, die der Writer maximal ansteuern kann
    fn capacity(&self) -> usize;

    /// Schreibt die Farben ab der ersten LED, überzählige werden ignoriert
    fn write(&mut self, colors: impl Iterator<Item = RGB8>) -> Result<(), LedError>;
}

/// Buffer-Größe für den ganzen Strip (3 Farben * 8 Bits pro LED + 1 Reset)
pub const LED_BUFFER_SIZE: usize = PIXEL_MAX_LEN * 24 + 1;

/// RMT Buffer, muss so lange leben wie der Writer
pub type LedBuffer = [PulseCode; LED_BUFFER_SIZE];

/// Real Hardware LED Writer
///
/// Nutzt das RMT Peripheral um WS2812 LEDs anzusteuern. Die Onboard-LED
/// ist ein Strip der Länge 1.
pub struct RmtLedWriter<'a> {
    led: SmartLedsAdapter<'a, LED_BUFFER_SIZE>,
    len: usize,
}

impl<'a> RmtLedWriter<'a> {
    /// # Parameter
    /// - `pin`: Datenleitung des Strips
    /// - `len`: Anzahl angeschlossener LEDs (höchstens `PIXEL_MAX_LEN`)
    /// - `buffer`: RMT Buffer (erstellt mit `smart_led_buffer!(PIXEL_MAX_LEN)`)
    pub fn new(
        pin: AnyPin<'a>,
        rmt_peripheral: esp_hal::peripherals::RMT<'a>,
        rmt_clock_mhz: u32,
        len: usize,
        buffer: &'a mut LedBuffer,
    ) -> Result<Self, LedError> {
        let rmt: Rmt<'a, Blocking> = Rmt::new(rmt_peripheral, Rate::from_mhz(rmt_clock_mhz))
            .map_err(|_| LedError::WriteFailed)?;
        let led = SmartLedsAdapter::new(rmt.channel0, pin, buffer);

        Ok(Self {
            led,
            len: len.min(PIXEL_MAX_LEN),
        })
    }
}

impl SmartLedWriter for RmtLedWriter<'_> {
    fn capacity(&self) -> usize {
        self.len
    }

    fn write(&mut self, colors: impl Iterator<Item = RGB8>) -> Result<(), LedError> {
        // Nicht gelieferte LEDs bleiben dunkel
        let padded = colors.chain(core::iter::repeat(RGB8::default())).take(self.len);
        self.led.write(padded).map_err(|_| LedError::WriteFailed)
    }
}
