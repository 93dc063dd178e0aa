//! Core Types für das DMXW-Netz und den Tester
//!
//! Datenstrukturen ohne Hardware-Dependencies

use core::fmt;

use crate::consts::{BROADCASTID, GATEWAYID, NODEID_MAX};

/// Identität einer Node im Funknetz (`1..=NODEID_MAX`)
///
/// `BROADCASTID` und `NODEID_UNDEF` sind nie gültige Identitäten,
/// daher kann ein `NodeId` nur über [`NodeId::new`] entstehen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(u8);

impl NodeId {
    pub const GATEWAY: NodeId = NodeId(GATEWAYID);

    pub const fn new(id: u8) -> Option<Self> {
        if id >= 1 && id <= NODEID_MAX {
            Some(Self(id))
        } else {
            None
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}", self.0)
    }
}

/// Ziel eines Funkpakets: eine einzelne Node oder alle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Address {
    Node(NodeId),
    Broadcast,
}

impl Address {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        if raw == BROADCASTID {
            return Some(Address::Broadcast);
        }
        match NodeId::new(raw) {
            Some(id) => Some(Address::Node(id)),
            None => None,
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Address::Node(id) => id.get(),
            Address::Broadcast => BROADCASTID,
        }
    }

    /// Gilt ein Paket an diese Adresse auch für `id`?
    pub fn includes(self, id: NodeId) -> bool {
        match self {
            Address::Node(target) => target == id,
            Address::Broadcast => true,
        }
    }
}

impl From<NodeId> for Address {
    fn from(id: NodeId) -> Self {
        Address::Node(id)
    }
}

/// Return-Codes im Funk-ACK
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AckCode {
    Ok = 0,
    /// Kommando nicht unterstützt
    ECmd = 1,
    /// Kein ACK nach allen Wiederholungen
    ETime = 2,
    /// Ungültiger DMXW-Kanal
    EDmxw = 3,
    /// Ungültiger oder kollidierender Port
    EPort = 4,
    Err = 254,
    /// "Noch kein ACK"
    Null = 255,
}

impl AckCode {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(AckCode::Ok),
            1 => Some(AckCode::ECmd),
            2 => Some(AckCode::ETime),
            3 => Some(AckCode::EDmxw),
            4 => Some(AckCode::EPort),
            254 => Some(AckCode::Err),
            255 => Some(AckCode::Null),
            _ => None,
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, AckCode::Ok)
    }
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AckCode::Ok => "ok",
            AckCode::ECmd => "command unsupported",
            AckCode::ETime => "timed out waiting for ack",
            AckCode::EDmxw => "DMXW channel access error",
            AckCode::EPort => "port access error",
            AckCode::Err => "unspecified error",
            AckCode::Null => "no ack",
        };
        f.write_str(text)
    }
}

/// Return-Codes im `TSTCMD_ACK`
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestAck {
    Ok = 0,
    /// Output-Prozessor wurde neu gestartet, wartet auf `TSTCMD_INIT`
    OutReboot = 1,
    BadParm = 2,
    BadState = 3,
    Corrupted = 4,
}

impl TestAck {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(TestAck::Ok),
            1 => Some(TestAck::OutReboot),
            2 => Some(TestAck::BadParm),
            3 => Some(TestAck::BadState),
            4 => Some(TestAck::Corrupted),
            _ => None,
        }
    }
}

impl fmt::Display for TestAck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TestAck::Ok => "ok",
            TestAck::OutReboot => "output processor rebooted",
            TestAck::BadParm => "bad parameter",
            TestAck::BadState => "bad test state",
            TestAck::Corrupted => "corrupted command",
        };
        f.write_str(text)
    }
}

/// Ausgang, auf dem ein Test läuft
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TestOutput {
    #[default]
    NoOutput = 0,
    Onboard = 1,
    Dmxw = 2,
}

impl TestOutput {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(TestOutput::NoOutput),
            1 => Some(TestOutput::Onboard),
            2 => Some(TestOutput::Dmxw),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TestType {
    #[default]
    Disabled = 0,
    Manual = 1,
    ChanSweep = 2,
    Pixel = 3,
}

impl TestType {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(TestType::Disabled),
            1 => Some(TestType::Manual),
            2 => Some(TestType::ChanSweep),
            3 => Some(TestType::Pixel),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TestState {
    #[default]
    Stopped = 0,
    Paused = 1,
    Running = 2,
}

impl TestState {
    pub const fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(TestState::Stopped),
            1 => Some(TestState::Paused),
            2 => Some(TestState::Running),
            _ => None,
        }
    }
}

/// Wert, der auf einen Ausgangs-Pin geschrieben wird
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinValue {
    Digital(bool),
    Pwm(u8),
}

/// Ein ausstehender Pin-Schreibvorgang (Pin + Wert)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinWrite {
    pub pin: u8,
    pub value: PinValue,
}
