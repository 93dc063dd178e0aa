//! Pure Business Logic Functions
//!
//! Funktionen ohne Hardware-Dependencies (testbar!)

use rgb::RGB8;

use crate::types::PinValue;

/// Helligkeitskurve nach CIE 1931 (L* → relative Leuchtdichte)
///
/// Eine LED mit PWM 200 wirkt deutlich weniger als doppelt so hell wie
/// eine mit PWM 100. Die Tabelle bildet lineare DMX-Werte auf PWM-Werte
/// ab, die gleichmäßig heller *wirken*.
const fn cie1931(value: u8) -> u8 {
    let lightness = value as f32 * 100.0 / 255.0;
    let luminance = if lightness <= 8.0 {
        lightness / 903.3
    } else {
        let t = (lightness + 16.0) / 116.0;
        t * t * t
    };
    (luminance * 255.0 + 0.5) as u8
}

const fn build_curve() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = cie1931(i as u8);
        i += 1;
    }
    table
}

static PERCEPTUAL_CURVE: [u8; 256] = build_curve();

/// Wandelt einen linearen Wert (0-255) in einen wahrgenommen-linearen PWM-Wert
///
/// # Beispiele
///
/// ```
/// # use dmxw_core::perceptual;
/// assert_eq!(perceptual(0), 0);
/// assert_eq!(perceptual(255), 255);
/// assert!(perceptual(128) < 128);
/// ```
pub fn perceptual(value: u8) -> u8 {
    PERCEPTUAL_CURVE[value as usize]
}

/// Berechnet den Pin-Wert für einen Port
///
/// Digitale Ports schalten ab der Hälfte des Wertebereichs ein.
/// Logarithmische Skalierung gilt nur für analoge Ports.
pub fn output_level(value: u8, is_analog: bool, logarithmic: bool) -> PinValue {
    if !is_analog {
        return PinValue::Digital(value >= 128);
    }
    if logarithmic {
        PinValue::Pwm(perceptual(value))
    } else {
        PinValue::Pwm(value)
    }
}

/// Farbrad für den Pixel-Test: 0-255 → Rot → Grün → Blau → Rot
pub fn wheel(position: u8) -> RGB8 {
    let pos = 255 - position;
    match pos {
        0..=84 => RGB8 {
            r: 255 - pos * 3,
            g: 0,
            b: pos * 3,
        },
        85..=169 => {
            let pos = pos - 85;
            RGB8 {
                r: 0,
                g: pos * 3,
                b: 255 - pos * 3,
            }
        }
        _ => {
            let pos = pos - 170;
            RGB8 {
                r: pos * 3,
                g: 255 - pos * 3,
                b: 0,
            }
        }
    }
}
