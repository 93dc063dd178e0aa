//! Netzwerk- und Protokoll-Konstanten
//!
//! Werte sind für Gateway, Nodes und Tester identisch.

// ============================================================================
// DMXW Funknetz
// ============================================================================

/// Node-ID des Gateways
pub const GATEWAYID: u8 = 1;

/// Reservierte Ziel-ID für Broadcasts (nie eine echte Node)
pub const BROADCASTID: u8 = 255;

/// Netzwerk-ID, gleich für alle Teilnehmer
pub const NETWORKID: u8 = 77;

/// Maximale Wartezeit auf ein ACK pro Sendeversuch (ms)
pub const ACK_WAIT_TIME: u32 = 50;

/// Zusätzliche Sendeversuche, wenn kein ACK kommt
pub const TX_NUM_RETRIES: u8 = 2;

pub const MAX_DMX512_CHANS: usize = 512;
pub const MAX_DMXW_CHANS: usize = 48;
pub const MAX_NODES: usize = 20;
pub const MAX_PORTS: usize = 16;

/// Markiert "keine Node"
pub const NODEID_UNDEF: u8 = 0;
pub const NODEID_MAX: u8 = MAX_DMXW_CHANS as u8 + 1;

/// Wire-Kodierung für "kein Port" / "kein Pin" (vorzeichenbehaftet -1)
pub const NO_PORT: u8 = 0xFF;

// ============================================================================
// Funk-Kommandos
// ============================================================================

pub const CMD_UNDEF: u8 = 0;
pub const CMD_RUN: u8 = 1;
pub const CMD_ACK: u8 = 2;
pub const CMD_PING: u8 = 3;
pub const CMD_PONG: u8 = 4;
pub const CMD_MAP: u8 = 5;
pub const CMD_MAPR: u8 = 6;
pub const CMD_CLRALL: u8 = 7;
pub const CMD_ECHO: u8 = 8;
pub const CMD_CHAN: u8 = 9;
pub const CMD_LOC: u8 = 10;
pub const CMD_OFF: u8 = 11;
pub const CMD_PORT: u8 = 12;
pub const CMD_CTRL: u8 = 13;
pub const CMD_TEST: u8 = 254;
pub const CMD_SAVE: u8 = 255;

// ============================================================================
// Tester (HMI ↔ Output-Prozessor)
// ============================================================================

/// Anzahl Onboard-Testkanäle
pub const NUM_CHANS_ONBOARD: u8 = 5;

/// Anzahl gültiger DMXW-Testkanäle
pub const NUM_CHAN_DMXW: u8 = 48;

/// Onboard-Kanal für die Geschwindigkeit des Pixel-Effekts
pub const PIXEL_DELAY_CHAN: u8 = 5;

pub const MIN_CHANNEL_VALUE: u8 = 0;
pub const MAX_CHANNEL_VALUE: u8 = 255;

/// Maximale Nutzdatenlänge eines seriellen Frames
pub const MAX_SERIAL_BUF_LEN: usize = 64;

pub const CHAR_ESC: u8 = 0xFD;
pub const CHAR_STX: u8 = 0xFE;
pub const CHAR_ETX: u8 = 0xFF;

pub const SELECT_ADD: u8 = 1;
pub const SELECT_DEL: u8 = 2;
pub const SELECT_CLR: u8 = 3;

pub const TSTCMD_UNDEF: u8 = 0;
pub const TSTCMD_INIT: u8 = 1;
pub const TSTCMD_STATE: u8 = 2;
pub const TSTCMD_TEST: u8 = 3;
pub const TSTCMD_SELECT: u8 = 4;
pub const TSTCMD_VALUE: u8 = 5;
pub const TSTCMD_PIXCFG: u8 = 6;
pub const TSTCMD_ACK: u8 = 7;
