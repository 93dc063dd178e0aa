//! Kanal-Zuordnungen (ChannelMapRegistry)
//!
//! - `gateway`: DMXW-Kanal → DMX-512-Kanal + Node + Port
//! - `node`: DMXW-Kanal → lokaler Port → Pin
//!
//! Jede Rolle besitzt ihre Tabellen exklusiv. Andere Module lesen oder
//! beantragen Änderungen nur über die Registry-Methoden.

mod gateway;
mod node;

pub use gateway::{GatewayMapping, GatewayRegistry};
pub use node::{MAP_IMAGE_LEN, MapImage, NodeMapping, NodeRegistry};

use core::fmt;

use crate::consts::{MAX_DMXW_CHANS, MAX_PORTS};
use crate::types::AckCode;

/// Fehler beim Ändern einer Zuordnung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MapError {
    /// DMXW-Kanal ungültig, nicht belegt oder anders belegt
    Channel,
    /// Port ungültig, ohne Pin oder kollidiert mit einer anderen Zuordnung
    Port,
}

impl From<MapError> for AckCode {
    fn from(err: MapError) -> Self {
        match err {
            MapError::Channel => AckCode::EDmxw,
            MapError::Port => AckCode::EPort,
        }
    }
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Channel => f.write_str("DMXW channel access error"),
            MapError::Port => f.write_str("port access error"),
        }
    }
}

/// DMXW-Kanal (1-basiert) → Tabellenindex
pub(crate) fn channel_index(chan: u8) -> Option<usize> {
    let chan = chan as usize;
    (1..=MAX_DMXW_CHANS).contains(&chan).then(|| chan - 1)
}

/// Physische Belegung eines Ports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinMapping {
    pub in_pin: Option<u8>,
    pub out_pin: Option<u8>,
    /// Anderer Port auf demselben physischen Pin (z.B. digital vs. PWM)
    pub conflict_port: Option<u8>,
    pub is_analog: bool,
}

impl PinMapping {
    pub const UNUSED: PinMapping = PinMapping {
        in_pin: None,
        out_pin: None,
        conflict_port: None,
        is_analog: false,
    };

    pub const fn digital_out(pin: u8) -> Self {
        Self {
            out_pin: Some(pin),
            ..Self::UNUSED
        }
    }

    pub const fn analog_out(pin: u8) -> Self {
        Self {
            out_pin: Some(pin),
            is_analog: true,
            ..Self::UNUSED
        }
    }

    pub const fn digital_in(pin: u8) -> Self {
        Self {
            in_pin: Some(pin),
            ..Self::UNUSED
        }
    }

    pub const fn with_conflict(self, port: u8) -> Self {
        Self {
            conflict_port: Some(port),
            ..self
        }
    }

    pub const fn has_pin(&self) -> bool {
        self.in_pin.is_some() || self.out_pin.is_some()
    }
}

/// Port → Pin Tabelle einer Node, wird beim Start einmal festgelegt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTable {
    ports: [PinMapping; MAX_PORTS],
}

impl Default for PortTable {
    fn default() -> Self {
        Self::new([PinMapping::UNUSED; MAX_PORTS])
    }
}

impl PortTable {
    pub const fn new(ports: [PinMapping; MAX_PORTS]) -> Self {
        Self { ports }
    }

    /// Belegt die ersten Ports, der Rest bleibt unbenutzt
    pub fn from_slice(ports: &[PinMapping]) -> Self {
        let mut table = Self::default();
        for (slot, mapping) in table.ports.iter_mut().zip(ports) {
            *slot = *mapping;
        }
        table
    }

    /// `None` für Ports außerhalb der Tabelle
    pub fn get(&self, port: u8) -> Option<&PinMapping> {
        self.ports.get(port as usize)
    }

    pub fn is_output(&self, port: u8) -> bool {
        self.get(port).is_some_and(|p| p.out_pin.is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &PinMapping)> {
        self.ports.iter().enumerate().map(|(i, p)| (i as u8, p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_index_bounds() {
        assert_eq!(channel_index(0), None);
        assert_eq!(channel_index(1), Some(0));
        assert_eq!(channel_index(48), Some(47));
        assert_eq!(channel_index(49), None);
    }

    #[test]
    fn test_port_table_from_slice() {
        let table = PortTable::from_slice(&[
            PinMapping::digital_out(4),
            PinMapping::analog_out(5).with_conflict(2),
            PinMapping::digital_out(5).with_conflict(1),
        ]);
        assert!(table.is_output(0));
        assert_eq!(table.get(1).and_then(|p| p.conflict_port), Some(2));
        assert_eq!(table.get(3), Some(&PinMapping::UNUSED));
        assert_eq!(table.get(16), None);
        assert!(!table.is_output(3));
    }

    #[test]
    fn test_map_error_ack_codes() {
        assert_eq!(AckCode::from(MapError::Channel), AckCode::EDmxw);
        assert_eq!(AckCode::from(MapError::Port), AckCode::EPort);
    }
}
