// LED Task - Beacon-Blinken und Farbrad-Effekt über RMT
use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{error, info};
use dmxw_core::wheel;
use embassy_time::{Duration, with_timeout};
use esp_hal::gpio::AnyPin;
use esp_hal_smartled::smart_led_buffer;
use rgb::RGB8;

use crate::config::{
    LED_BRIGHTNESS, LOCATE_BLINKS, LOCATE_HALF_PERIOD_MS, PIXEL_MAX_LEN, PIXEL_MIN_STEP_MS,
    RMT_CLOCK_MHZ,
};
use crate::hal::{RmtLedWriter, SmartLedWriter};
use crate::{LedCommand, LedCommandReceiver};

/// Gesetzt, solange der Beacon blinkt
pub static LOCATING: AtomicBool = AtomicBool::new(false);

/// Was die LEDs gerade zeigen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Off,
    /// Verbleibende Halbperioden, gerade Anzahl = an
    Locate { toggles: u8 },
    Rainbow { len: usize, offset: u8 },
}

impl Effect {
    /// Nächster Schritt nach Ablauf der Wartezeit
    fn step(self) -> Self {
        match self {
            Effect::Locate { toggles } if toggles > 1 => Effect::Locate {
                toggles: toggles - 1,
            },
            Effect::Locate { .. } => Effect::Off,
            Effect::Rainbow { len, offset } => Effect::Rainbow {
                len,
                offset: offset.wrapping_add(1),
            },
            Effect::Off => Effect::Off,
        }
    }
}

fn render<L: SmartLedWriter>(led: &mut L, effect: Effect) {
    let result = match effect {
        Effect::Off => led.write(core::iter::empty()),
        Effect::Locate { toggles } if toggles % 2 == 0 => led.write(core::iter::once(RGB8 {
            r: LED_BRIGHTNESS,
            g: LED_BRIGHTNESS,
            b: LED_BRIGHTNESS,
        })),
        Effect::Locate { .. } => led.write(core::iter::empty()),
        Effect::Rainbow { len, offset } => {
            let span = len.max(1);
            led.write((0..len).map(|i| wheel(offset.wrapping_add((i * 256 / span) as u8))))
        }
    };
    if result.is_err() {
        error!("Failed to write to LED");
    }
}

/// LED Logic - Effekt-Steuerung ohne Hardware-Abhängigkeit
///
/// Wartet auf Kommandos vom Dispatcher. Läuft ein Effekt, wird nach
/// dessen Schrittweite auch ohne Kommando weitergeschaltet.
pub async fn led_logic<L: SmartLedWriter>(mut led: L, commands: LedCommandReceiver) {
    let mut effect = Effect::Off;
    let mut step_ms = PIXEL_MIN_STEP_MS;
    render(&mut led, effect);

    loop {
        let wait_ms = match effect {
            Effect::Off => None,
            Effect::Locate { .. } => Some(LOCATE_HALF_PERIOD_MS),
            Effect::Rainbow { .. } => Some(step_ms),
        };
        let command = match wait_ms {
            None => Some(commands.receive().await),
            Some(ms) => with_timeout(Duration::from_millis(ms), commands.receive())
                .await
                .ok(),
        };

        effect = match command {
            Some(LedCommand::Locate) => {
                info!("LED: locate");
                LOCATING.store(true, Ordering::Release);
                Effect::Locate {
                    toggles: LOCATE_BLINKS * 2,
                }
            }
            Some(LedCommand::Configure(length)) => {
                let len = (length as usize).min(led.capacity());
                info!("LED: rainbow on {} pixels", len);
                Effect::Rainbow { len, offset: 0 }
            }
            Some(LedCommand::Delay(value)) => {
                step_ms = PIXEL_MIN_STEP_MS + value as u64;
                continue;
            }
            Some(LedCommand::Clear) => Effect::Off,
            None => effect.step(),
        };

        if !matches!(effect, Effect::Locate { .. }) {
            LOCATING.store(false, Ordering::Release);
        }
        render(&mut led, effect);
    }
}

/// LED Task - Embassy Task für parallele Ausführung
///
/// # Parameter
/// - `pin`: Datenleitung (Onboard-LED oder Pixel-Strip)
/// - `len`: Anzahl LEDs an der Leitung
/// - `commands`: Channel Receiver für Beacon- und Pixel-Kommandos
#[embassy_executor::task]
pub async fn led_task(
    pin: AnyPin<'static>,
    rmt_peripheral: esp_hal::peripherals::RMT<'static>,
    len: usize,
    commands: LedCommandReceiver,
) {
    let mut rmt_buffer = smart_led_buffer!(PIXEL_MAX_LEN);

    let led = match RmtLedWriter::new(pin, rmt_peripheral, RMT_CLOCK_MHZ, len, &mut rmt_buffer) {
        Ok(led) => led,
        Err(e) => {
            error!("LED: RMT init failed: {}", e);
            return;
        }
    };

    led_logic(led, commands).await;
}
