// Projekt-Konfiguration: Konstanten und Hardware-Zuordnungen
//
// Pin-Nummern hier müssen zu den Peripherals passen, die main.rs verdrahtet.

use dmxw_core::{NodeId, PinMapping, PortTable};
use dmxw_core::tester::ONBOARD_CHANS;

// ============================================================================
// Build-Zeit Konfiguration (.env, siehe .env.example)
// ============================================================================

/// Rolle dieses Geräts im Netz
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum Role {
    /// Funk-Node mit Ports
    Node,
    /// Output-Prozessor des Testers (UART zum HMI, sendet als Gateway)
    Tester,
}

/// Wird zur Build-Zeit aus DMXW_ROLE geladen (build.rs prüft den Wert)
pub const ROLE: Role = match env!("DMXW_ROLE").as_bytes() {
    b"tester" => Role::Tester,
    _ => Role::Node,
};

/// Node-ID aus DMXW_NODE_ID, build.rs stellt 2..=49 sicher
pub const NODE_ID: NodeId = match NodeId::new(parse_u8(env!("DMXW_NODE_ID"))) {
    Some(id) => id,
    None => panic!("DMXW_NODE_ID out of range"),
};

/// WiFi-Kanal für ESP-NOW
pub const RADIO_CHANNEL: u8 = parse_u8(env!("DMXW_RADIO_CHANNEL"));

const fn parse_u8(text: &str) -> u8 {
    let bytes = text.as_bytes();
    let mut value: u8 = 0;
    let mut i = 0;
    while i < bytes.len() {
        value = value * 10 + (bytes[i] - b'0');
        i += 1;
    }
    value
}

// ============================================================================
// Speicher
// ============================================================================

/// Heap-Größe für den Funk-Treiber (Bytes)
pub const RADIO_HEAP_SIZE: usize = 65536; // 64 KB

/// Flash-Offset für das Zuordnungs-Abbild (NVS-Partition der Standard-Tabelle)
pub const MAP_STORE_OFFSET: u32 = 0x9000;

// ============================================================================
// LED / Pixel-Strip
// ============================================================================

/// Helligkeits-Level für die Beacon-LED auf GPIO8 (0-255)
pub const LED_BRIGHTNESS: u8 = 10;

/// RMT Taktfrequenz in MHz
/// 80 MHz ist optimal für WS2812 LED-Timing
pub const RMT_CLOCK_MHZ: u32 = 80;

/// Maximale Länge des Pixel-Strips an GPIO18 (bestimmt die RMT-Buffer-Größe)
pub const PIXEL_MAX_LEN: usize = 60;

/// Schnellster Schritt des Farbrad-Effekts, Kanal-Wert addiert sich dazu (ms)
pub const PIXEL_MIN_STEP_MS: u64 = 5;

/// Wie oft die Beacon-LED bei CMD_LOC blinkt
pub const LOCATE_BLINKS: u8 = 10;

/// Halbe Blink-Periode des Beacons (ms)
pub const LOCATE_HALF_PERIOD_MS: u64 = 250;

// ============================================================================
// PWM (LEDC)
// ============================================================================

/// PWM-Frequenz analoger Ports in kHz
pub const PWM_FREQUENCY_KHZ: u32 = 24;

// ============================================================================
// Node: Port-Tabelle
// ============================================================================

/// Port → Pin Tabelle einer Node
///
/// Port 4/5 sind PWM-Ausgänge auf GPIO4/5, Port 6/7 nutzen dieselben Pins
/// digital und schließen sich mit ihnen gegenseitig aus.
pub fn node_ports() -> PortTable {
    PortTable::from_slice(&[
        PinMapping::digital_out(0),
        PinMapping::digital_out(1),
        PinMapping::digital_out(2),
        PinMapping::digital_out(3),
        PinMapping::analog_out(4).with_conflict(6),
        PinMapping::analog_out(5).with_conflict(7),
        PinMapping::digital_out(4).with_conflict(4),
        PinMapping::digital_out(5).with_conflict(5),
        PinMapping::digital_in(6),
        PinMapping::digital_in(7),
    ])
}

/// Wartezeit pro Poll der Node-Schleife (ms)
pub const NODE_POLL_MS: u32 = 100;

// ============================================================================
// Tester
// ============================================================================

/// Onboard-Kanäle 1..=5 des Output-Prozessors
pub const ONBOARD: [PinMapping; ONBOARD_CHANS] = [
    PinMapping::digital_out(0),
    PinMapping::digital_out(1),
    PinMapping::analog_out(4),
    PinMapping::analog_out(5),
    PinMapping::analog_out(10),
];

/// UART1 zum HMI (RX GPIO23, TX GPIO22)
pub const IPC_BAUDRATE: u32 = 115_200;

/// Leere Leitung so lange → Decoder verlässt PURGE (ms)
pub const IPC_IDLE_MS: u64 = 20;

/// UART Lese-Buffer (Bytes)
pub const IPC_READ_BUFFER_SIZE: usize = 64;

/// Abstand der CMD_RUN Broadcasts während eines DMXW-Tests (ms)
pub const RUN_INTERVAL_MS: u64 = 40;

/// Schrittweite eines Kanal-Sweeps (ms)
pub const SWEEP_INTERVAL_MS: u64 = 1000;
