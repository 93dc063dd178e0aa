//! Funkpakete des DMXW-Netzes
//!
//! Layout: `[src][src][dest][dest][cmd][args...]`
//!
//! Quell- und Ziel-ID werden doppelt übertragen. Stimmen die beiden Kopien
//! beim Empfang nicht überein, wird das Paket verworfen, als wäre es nie
//! angekommen.

use heapless::Vec;

use crate::consts::*;
use crate::types::{AckCode, Address, NodeId};

pub const HEADER_LEN: usize = 5;
pub const MAX_PACKET_LEN: usize = HEADER_LEN + MAX_DMXW_CHANS;

pub type PacketBytes = Vec<u8, MAX_PACKET_LEN>;

/// Werte eines `CMD_RUN`, Index 0 = DMXW-Kanal 1
pub type RunValues = Vec<u8, MAX_DMXW_CHANS>;

/// Antwort einer Node auf `CMD_ECHO`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelReport {
    pub chan: u8,
    pub port: Option<u8>,
    pub out_pin: Option<u8>,
    pub conflict_port: Option<u8>,
    pub is_analog: bool,
    pub value: u8,
}

impl ChannelReport {
    /// Bericht für einen Kanal ohne Port-Zuordnung
    pub const fn unassigned(chan: u8) -> Self {
        Self {
            chan,
            port: None,
            out_pin: None,
            conflict_port: None,
            is_analog: false,
            value: 0,
        }
    }
}

/// Alle Funk-Kommandos mit ihren Argumenten
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunValues),
    /// Quittung einer Node: Kommando-Code der Anfrage + Ergebnis
    Ack { cmd: u8, code: AckCode },
    Ping,
    Pong,
    Map { chan: u8, port: u8, logarithmic: bool },
    MapRemove { chan: u8 },
    ClearAll,
    Echo { chan: u8 },
    Chan(ChannelReport),
    Locate,
    Off,
    Port { port: u8, value: u8 },
    Ctrl { chan: u8, value: u8 },
    Test,
    Save,
}

impl Command {
    pub fn code(&self) -> u8 {
        match self {
            Command::Run(_) => CMD_RUN,
            Command::Ack { .. } => CMD_ACK,
            Command::Ping => CMD_PING,
            Command::Pong => CMD_PONG,
            Command::Map { .. } => CMD_MAP,
            Command::MapRemove { .. } => CMD_MAPR,
            Command::ClearAll => CMD_CLRALL,
            Command::Echo { .. } => CMD_ECHO,
            Command::Chan(_) => CMD_CHAN,
            Command::Locate => CMD_LOC,
            Command::Off => CMD_OFF,
            Command::Port { .. } => CMD_PORT,
            Command::Ctrl { .. } => CMD_CTRL,
            Command::Test => CMD_TEST,
            Command::Save => CMD_SAVE,
        }
    }

    /// Antworten (ACK, PONG, CHAN) und der Laufzeit-Broadcast werden
    /// selbst nie beantwortet.
    pub fn expects_reply(&self) -> bool {
        !matches!(
            self,
            Command::Run(_) | Command::Ack { .. } | Command::Pong | Command::Chan(_)
        )
    }

    /// Ist `self` die passende Antwort auf `request`?
    pub fn answers(&self, request: &Command) -> bool {
        match (self, request) {
            (Command::Pong, Command::Ping) => true,
            (Command::Chan(report), Command::Echo { chan }) => report.chan == *chan,
            (Command::Ack { cmd, .. }, request) => *cmd == request.code(),
            _ => false,
        }
    }

    fn write_args(&self, out: &mut PacketBytes) {
        // Kapazität ist durch RunValues begrenzt, push kann nicht scheitern
        let mut put = |byte: u8| {
            let _ = out.push(byte);
        };
        match self {
            Command::Run(values) => values.iter().for_each(|&v| put(v)),
            Command::Ack { cmd, code } => {
                put(*cmd);
                put(*code as u8);
            }
            Command::Map {
                chan,
                port,
                logarithmic,
            } => {
                put(*chan);
                put(*port);
                put(*logarithmic as u8);
            }
            Command::MapRemove { chan } | Command::Echo { chan } => put(*chan),
            Command::Chan(report) => {
                put(report.chan);
                put(report.port.unwrap_or(NO_PORT));
                put(report.out_pin.unwrap_or(NO_PORT));
                put(report.conflict_port.unwrap_or(NO_PORT));
                put(report.is_analog as u8);
                put(report.value);
            }
            Command::Port { port, value } => {
                put(*port);
                put(*value);
            }
            Command::Ctrl { chan, value } => {
                put(*chan);
                put(*value);
            }
            Command::Ping
            | Command::Pong
            | Command::ClearAll
            | Command::Locate
            | Command::Off
            | Command::Test
            | Command::Save => {}
        }
    }

    fn parse(code: u8, args: &[u8]) -> Result<Command, ArgError> {
        let optional = |raw: u8| (raw != NO_PORT).then_some(raw);

        let command = match (code, args) {
            (CMD_RUN, values) => {
                if values.is_empty() {
                    return Err(ArgError::Malformed);
                }
                Command::Run(RunValues::from_slice(values).map_err(|_| ArgError::Malformed)?)
            }
            (CMD_ACK, &[cmd, code]) => Command::Ack {
                cmd,
                code: AckCode::from_u8(code).ok_or(ArgError::Malformed)?,
            },
            (CMD_PING, []) => Command::Ping,
            (CMD_PONG, []) => Command::Pong,
            (CMD_MAP, &[chan, port, log]) => Command::Map {
                chan,
                port,
                logarithmic: log != 0,
            },
            (CMD_MAPR, &[chan]) => Command::MapRemove { chan },
            (CMD_CLRALL, []) => Command::ClearAll,
            (CMD_ECHO, &[chan]) => Command::Echo { chan },
            (CMD_CHAN, &[chan, port, out_pin, conflict, analog, value]) => {
                Command::Chan(ChannelReport {
                    chan,
                    port: optional(port),
                    out_pin: optional(out_pin),
                    conflict_port: optional(conflict),
                    is_analog: analog != 0,
                    value,
                })
            }
            (CMD_LOC, []) => Command::Locate,
            (CMD_OFF, []) => Command::Off,
            (CMD_PORT, &[port, value]) => Command::Port { port, value },
            (CMD_CTRL, &[chan, value]) => Command::Ctrl { chan, value },
            (CMD_TEST, []) => Command::Test,
            (CMD_SAVE, []) => Command::Save,
            (
                CMD_ACK | CMD_PING | CMD_PONG | CMD_MAP | CMD_MAPR | CMD_CLRALL | CMD_ECHO
                | CMD_CHAN | CMD_LOC | CMD_OFF | CMD_PORT | CMD_CTRL | CMD_TEST | CMD_SAVE,
                _,
            ) => return Err(ArgError::Malformed),
            _ => return Err(ArgError::Unsupported),
        };
        Ok(command)
    }
}

enum ArgError {
    Unsupported,
    Malformed,
}

/// Gründe, ein empfangenes Paket abzulehnen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketError {
    /// Kürzer als der Header
    TooShort,
    /// Die beiden Kopien von Quelle oder Ziel weichen ab
    AddressMismatch,
    /// Quelle oder Ziel ist keine gültige ID
    InvalidAddress,
    /// Unbekannter Kommando-Code
    Unsupported { src: NodeId, dest: Address, code: u8 },
    /// Bekanntes Kommando mit falschen Argumenten
    Malformed { src: NodeId, dest: Address, code: u8 },
}

impl PacketError {
    /// Nur diese Fehler werden dem Absender quittiert, alles andere gilt
    /// als nie empfangen.
    pub fn reply(&self) -> Option<(NodeId, Address, u8, AckCode)> {
        match *self {
            PacketError::Unsupported { src, dest, code } => Some((src, dest, code, AckCode::ECmd)),
            PacketError::Malformed { src, dest, code } => Some((src, dest, code, AckCode::Err)),
            _ => None,
        }
    }
}

impl core::fmt::Display for PacketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PacketError::TooShort => f.write_str("packet shorter than header"),
            PacketError::AddressMismatch => f.write_str("duplicated address copies differ"),
            PacketError::InvalidAddress => f.write_str("invalid node address"),
            PacketError::Unsupported { code, .. } => write!(f, "unsupported command {}", code),
            PacketError::Malformed { code, .. } => write!(f, "malformed arguments for command {}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub src: NodeId,
    pub dest: Address,
    pub command: Command,
}

impl Packet {
    pub fn new(src: NodeId, dest: impl Into<Address>, command: Command) -> Self {
        Self {
            src,
            dest: dest.into(),
            command,
        }
    }

    pub fn encode(&self) -> PacketBytes {
        let mut out = PacketBytes::new();
        let src = self.src.get();
        let dest = self.dest.to_u8();
        for byte in [src, src, dest, dest, self.command.code()] {
            let _ = out.push(byte);
        }
        self.command.write_args(&mut out);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Packet, PacketError> {
        let &[src_a, src_b, dest_a, dest_b, code, ref args @ ..] = bytes else {
            return Err(PacketError::TooShort);
        };
        if src_a != src_b || dest_a != dest_b {
            return Err(PacketError::AddressMismatch);
        }
        let src = NodeId::new(src_a).ok_or(PacketError::InvalidAddress)?;
        let dest = Address::from_u8(dest_a).ok_or(PacketError::InvalidAddress)?;

        match Command::parse(code, args) {
            Ok(command) => Ok(Packet { src, dest, command }),
            Err(ArgError::Unsupported) => Err(PacketError::Unsupported { src, dest, code }),
            Err(ArgError::Malformed) => Err(PacketError::Malformed { src, dest, code }),
        }
    }
}
