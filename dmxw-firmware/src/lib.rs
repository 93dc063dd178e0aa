// Library-Root: Hardware-Anbindung der DMXW Core Logik
// Keine Standard-Bibliothek (Embedded System)
#![no_std]

// Module
pub mod config;
pub mod hal;
pub mod tasks;

// Embassy Channel-Typen
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};

/// Kommandos an den LED-Task (Beacon-LED oder Pixel-Strip)
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum LedCommand {
    /// Beacon blinken lassen (CMD_LOC)
    Locate,
    /// Farbrad-Effekt mit so vielen Pixeln starten
    Configure(u16),
    /// Wartezeit zwischen zwei Effekt-Schritten (Kanal-Wert 0-255)
    Delay(u8),
    /// Alle Pixel aus
    Clear,
}

// ============================================================================
// Type-Aliase für Channel-Typen
// ============================================================================

/// Channel für LED-Kommandos (Dispatcher → LED Task)
/// - 4: Nachrichten-Kapazität, volle Queue wird als Busy gemeldet
pub type LedCommandChannel = Channel<NoopRawMutex, LedCommand, 4>;

pub type LedCommandSender = Sender<'static, NoopRawMutex, LedCommand, 4>;

pub type LedCommandReceiver = Receiver<'static, NoopRawMutex, LedCommand, 4>;
