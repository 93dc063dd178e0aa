//! Hardware Abstraction Traits
//!
//! Diese Traits definieren Schnittstellen zu den Kollaborateuren
//! (Funk, Pins, Flash, Beacon, Pixel-Strip) ohne konkrete Implementierung.
//!
//! # Implementierungen
//! - **Production:** ESP-NOW, GPIO, Flash, RMT (in `dmxw-firmware`)
//! - **Testing:** In-Memory Mocks (in `dmxw-tests`)

use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::mapping::MapImage;
use crate::packet::PacketBytes;
use crate::types::PinValue;

/// Fehler-Typ für Funk-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    SendFailed,
}

/// Fehler-Typ für Pin-Operationen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError {
    UnknownPin(u8),
    WriteFailed,
}

/// Fehler-Typ für den Mapping-Speicher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    Io,
    /// Gespeichertes Abbild ist beschädigt oder passt nicht zur Port-Tabelle
    Corrupt,
}

/// Fehler-Typ für den Locator-Beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeaconError {
    Busy,
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("radio send failed")
    }
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinError::UnknownPin(pin) => write!(f, "unknown pin {}", pin),
            PinError::WriteFailed => f.write_str("pin write failed"),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io => f.write_str("storage i/o error"),
            StoreError::Corrupt => f.write_str("stored mapping image is corrupt"),
        }
    }
}

/// Funk-Transport (Paket rein, Paket raus)
///
/// Netzwerk-ID und Verschlüsselung sind Sache der Implementierung.
#[allow(async_fn_in_trait)]
pub trait RadioTransport {
    /// Sendet ein fertig kodiertes Paket
    async fn send(&mut self, bytes: &[u8]) -> Result<(), RadioError>;

    /// Wartet bis zu `timeout_ms` auf das nächste Paket
    ///
    /// `None` bedeutet: Timeout, nichts empfangen.
    async fn receive(&mut self, timeout_ms: u32) -> Option<PacketBytes>;
}

/// Monotone Zeitquelle in Millisekunden
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Abbruch-Signal für blockierende Wartevorgänge
///
/// Wird vor jedem Sendeversuch und während der ACK-Wartezeit geprüft.
pub trait CancelSignal {
    fn is_cancelled(&self) -> bool;
}

impl CancelSignal for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// Abbruch-Signal, das nie auslöst
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Pin-Zugriff
pub trait PinIo {
    fn write_pin(&mut self, pin: u8, value: PinValue) -> Result<(), PinError>;

    fn read_pin(&mut self, pin: u8) -> Result<u8, PinError>;
}

/// Nichtflüchtiger Speicher für die Kanal-zu-Port Zuordnung einer Node
pub trait MappingStore {
    fn save(&mut self, image: &MapImage) -> Result<(), StoreError>;

    /// `Ok(None)` wenn noch nie gespeichert wurde
    fn load(&mut self) -> Result<Option<MapImage>, StoreError>;
}

/// Locator-Beacon (z.B. Onboard-LED blinken lassen)
pub trait Beacon {
    fn locate(&mut self) -> Result<(), BeaconError>;
}

/// Pixel-Strip für den PIXEL-Test
pub trait PixelRenderer {
    /// Anzahl individuell steuerbarer Pixel
    fn configure(&mut self, length: u16);

    /// Verzögerung zwischen Effekt-Schritten (Onboard-Kanal `PIXEL_DELAY_CHAN`)
    fn set_delay(&mut self, value: u8);

    fn clear(&mut self);
}
