//! Zuordnungstabelle einer Node: DMXW-Kanal → Port → Pin

use heapless::Vec;

use crate::consts::{MAX_DMXW_CHANS, MAX_PORTS, NO_PORT};
use crate::frame::CRC8;
use crate::logic::output_level;
use crate::packet::ChannelReport;
use crate::traits::StoreError;
use crate::types::PinWrite;

use super::{MapError, PortTable, channel_index};

/// Port-Zuordnung eines DMXW-Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeMapping {
    pub port: u8,
    pub is_output: bool,
    /// Analoge Werte auf wahrgenommene Helligkeit skalieren
    pub logarithmic: bool,
    pub value: u8,
}

/// Besitzt die Kanal-Zuordnungen einer Node
///
/// Jeder Kanal hat höchstens einen Port, kein Port gehört zwei Kanälen,
/// und zwei Ports, die sich einen Pin teilen, sind nie gleichzeitig belegt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRegistry {
    ports: PortTable,
    slots: [Option<NodeMapping>; MAX_DMXW_CHANS],
    port_values: [u8; MAX_PORTS],
}

impl NodeRegistry {
    pub fn new(ports: PortTable) -> Self {
        Self {
            ports,
            slots: [None; MAX_DMXW_CHANS],
            port_values: [0; MAX_PORTS],
        }
    }

    pub fn ports(&self) -> &PortTable {
        &self.ports
    }

    fn owner(&self, port: u8) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.is_some_and(|m| m.port == port))
    }

    pub fn assign_port(
        &mut self,
        dmxw_chan: u8,
        port: u8,
        is_output: bool,
        logarithmic: bool,
    ) -> Result<(), MapError> {
        let index = channel_index(dmxw_chan).ok_or(MapError::Channel)?;
        let pins = self.ports.get(port).ok_or(MapError::Port)?;
        let has_pin = if is_output {
            pins.out_pin.is_some()
        } else {
            pins.in_pin.is_some()
        };
        if !has_pin {
            return Err(MapError::Port);
        }

        let held_elsewhere = |p: u8| self.owner(p).is_some_and(|owner| owner != index);
        if held_elsewhere(port) {
            return Err(MapError::Port);
        }
        if pins.conflict_port.is_some_and(held_elsewhere) {
            return Err(MapError::Port);
        }

        let value = match self.slots[index] {
            Some(previous) if previous.port == port => previous.value,
            _ => self.port_values[port as usize],
        };
        self.slots[index] = Some(NodeMapping {
            port,
            is_output,
            logarithmic,
            value,
        });
        debug!("node: dmxw {} -> port {}", dmxw_chan, port);
        Ok(())
    }

    /// Gibt den Kanal frei und liefert die bisherige Zuordnung
    pub fn clear_channel(&mut self, dmxw_chan: u8) -> Result<Option<NodeMapping>, MapError> {
        let index = channel_index(dmxw_chan).ok_or(MapError::Channel)?;
        Ok(self.slots[index].take())
    }

    pub fn clear_all(&mut self) {
        self.slots = [None; MAX_DMXW_CHANS];
    }

    pub fn lookup(&self, dmxw_chan: u8) -> Option<NodeMapping> {
        channel_index(dmxw_chan).and_then(|i| self.slots[i])
    }

    /// Bericht für `CMD_CHAN`, `None` wenn der Kanal frei ist
    pub fn describe(&self, dmxw_chan: u8) -> Option<ChannelReport> {
        let mapping = self.lookup(dmxw_chan)?;
        let pins = self.ports.get(mapping.port)?;
        Some(ChannelReport {
            chan: dmxw_chan,
            port: Some(mapping.port),
            out_pin: pins.out_pin,
            conflict_port: pins.conflict_port,
            is_analog: pins.is_analog,
            value: mapping.value,
        })
    }

    fn level(&self, port: u8, value: u8, logarithmic: bool) -> Option<PinWrite> {
        let pins = self.ports.get(port)?;
        let pin = pins.out_pin?;
        Some(PinWrite {
            pin,
            value: output_level(value, pins.is_analog, logarithmic),
        })
    }

    /// Setzt den Wert eines belegten Kanals
    ///
    /// Liefert den Pin-Schreibvorgang, falls der Port ein Ausgang ist.
    pub fn set_channel_value(
        &mut self,
        dmxw_chan: u8,
        value: u8,
    ) -> Result<Option<PinWrite>, MapError> {
        let index = channel_index(dmxw_chan).ok_or(MapError::Channel)?;
        let mapping = self.slots[index].as_mut().ok_or(MapError::Channel)?;
        mapping.value = value;
        let mapping = *mapping;
        self.port_values[mapping.port as usize] = value;

        if !mapping.is_output {
            return Ok(None);
        }
        Ok(self.level(mapping.port, value, mapping.logarithmic))
    }

    /// Setzt einen Ausgangs-Port direkt, auch ohne Kanal-Zuordnung
    pub fn set_port_value(&mut self, port: u8, value: u8) -> Result<PinWrite, MapError> {
        let channel = self.owner(port);
        let logarithmic = channel
            .and_then(|i| self.slots[i])
            .is_some_and(|m| m.logarithmic);
        let write = self.level(port, value, logarithmic).ok_or(MapError::Port)?;

        self.port_values[port as usize] = value;
        if let Some(mapping) = channel.and_then(|i| self.slots[i].as_mut()) {
            mapping.value = value;
        }
        Ok(write)
    }

    /// Alle Ausgänge auf 0
    pub fn off(&mut self) -> Vec<PinWrite, MAX_PORTS> {
        self.port_values = [0; MAX_PORTS];
        for mapping in self.slots.iter_mut().flatten() {
            mapping.value = 0;
        }
        self.ports
            .iter()
            .filter_map(|(port, _)| self.level(port, 0, false))
            .collect()
    }

    /// Übernimmt einen `CMD_RUN` (Index 0 = DMXW-Kanal 1)
    pub fn apply_run(&mut self, values: &[u8]) -> Vec<PinWrite, MAX_DMXW_CHANS> {
        let mut writes = Vec::new();
        for (chan, &value) in (1..=MAX_DMXW_CHANS as u8).zip(values) {
            if let Ok(Some(write)) = self.set_channel_value(chan, value) {
                let _ = writes.push(write);
            }
        }
        writes
    }

    /// Aktuelle Pegel aller belegten Ausgänge
    pub fn outputs(&self) -> Vec<PinWrite, MAX_DMXW_CHANS> {
        self.slots
            .iter()
            .flatten()
            .filter(|m| m.is_output)
            .filter_map(|m| self.level(m.port, m.value, m.logarithmic))
            .collect()
    }

    pub fn image(&self) -> MapImage {
        MapImage::from_slots(&self.slots)
    }

    /// Ersetzt alle Zuordnungen durch ein gespeichertes Abbild
    ///
    /// Passt das Abbild nicht zur Port-Tabelle, bleibt die Tabelle leer.
    pub fn restore(&mut self, image: &MapImage) -> Result<(), StoreError> {
        self.clear_all();
        for (chan, entry) in (1..=MAX_DMXW_CHANS as u8).zip(image.entries()) {
            let Some((port, is_output, logarithmic)) = entry else {
                continue;
            };
            if self.assign_port(chan, port, is_output, logarithmic).is_err() {
                warn!("node: stored mapping for dmxw {} rejected", chan);
                self.clear_all();
                return Err(StoreError::Corrupt);
            }
        }
        Ok(())
    }
}

const IMAGE_MAGIC: u8 = 0xD7;
const IMAGE_VERSION: u8 = 1;
const FLAG_OUTPUT: u8 = 0x01;
const FLAG_LOG: u8 = 0x02;

/// Magic + Version + (Port, Flags) pro Kanal + CRC-8
pub const MAP_IMAGE_LEN: usize = 2 + 2 * MAX_DMXW_CHANS + 1;

/// Persistierbares Abbild der Kanal-Zuordnungen einer Node
///
/// Werte werden nicht gespeichert, nach einem Neustart sind alle Ausgänge 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapImage {
    bytes: [u8; MAP_IMAGE_LEN],
}

impl MapImage {
    fn from_slots(slots: &[Option<NodeMapping>; MAX_DMXW_CHANS]) -> Self {
        let mut bytes = [0u8; MAP_IMAGE_LEN];
        bytes[0] = IMAGE_MAGIC;
        bytes[1] = IMAGE_VERSION;
        for (entry, slot) in bytes[2..MAP_IMAGE_LEN - 1].chunks_exact_mut(2).zip(slots) {
            match slot {
                Some(m) => {
                    entry[0] = m.port;
                    entry[1] = (m.is_output as u8 * FLAG_OUTPUT) | (m.logarithmic as u8 * FLAG_LOG);
                }
                None => {
                    entry[0] = NO_PORT;
                    entry[1] = 0;
                }
            }
        }
        bytes[MAP_IMAGE_LEN - 1] = CRC8.checksum(&bytes[..MAP_IMAGE_LEN - 1]);
        Self { bytes }
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self, StoreError> {
        let bytes: [u8; MAP_IMAGE_LEN] = raw.try_into().map_err(|_| StoreError::Corrupt)?;
        if bytes[0] != IMAGE_MAGIC || bytes[1] != IMAGE_VERSION {
            return Err(StoreError::Corrupt);
        }
        if CRC8.checksum(&bytes[..MAP_IMAGE_LEN - 1]) != bytes[MAP_IMAGE_LEN - 1] {
            return Err(StoreError::Corrupt);
        }
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// (Port, Ausgang, logarithmisch) pro Kanal
    fn entries(&self) -> impl Iterator<Item = Option<(u8, bool, bool)>> + '_ {
        self.bytes[2..MAP_IMAGE_LEN - 1].chunks_exact(2).map(|entry| {
            (entry[0] != NO_PORT).then(|| {
                (
                    entry[0],
                    entry[1] & FLAG_OUTPUT != 0,
                    entry[1] & FLAG_LOG != 0,
                )
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::PinMapping;
    use crate::types::PinValue;

    /// Port 0/1: digital, Port 2: PWM auf Pin 6, Port 3: digital auf Pin 6
    fn registry() -> NodeRegistry {
        NodeRegistry::new(PortTable::from_slice(&[
            PinMapping::digital_out(4),
            PinMapping::digital_out(5),
            PinMapping::analog_out(6).with_conflict(3),
            PinMapping::digital_out(6).with_conflict(2),
            PinMapping::digital_in(7),
        ]))
    }

    #[test]
    fn test_assign_and_describe() {
        let mut reg = registry();
        reg.assign_port(3, 2, true, true).unwrap();
        let report = reg.describe(3).unwrap();
        assert_eq!(report.port, Some(2));
        assert_eq!(report.out_pin, Some(6));
        assert_eq!(report.conflict_port, Some(3));
        assert!(report.is_analog);
        assert_eq!(reg.describe(4), None);
    }

    #[test]
    fn test_port_cannot_serve_two_channels() {
        let mut reg = registry();
        reg.assign_port(1, 0, true, false).unwrap();
        assert_eq!(reg.assign_port(2, 0, true, false), Err(MapError::Port));
        // Derselbe Kanal darf neu zuordnen
        reg.assign_port(1, 0, true, true).unwrap();
        reg.assign_port(1, 1, true, false).unwrap();
        reg.assign_port(2, 0, true, false).unwrap();
    }

    #[test]
    fn test_conflicting_ports_are_exclusive() {
        let mut reg = registry();
        reg.assign_port(1, 2, true, false).unwrap();
        assert_eq!(reg.assign_port(2, 3, true, false), Err(MapError::Port));
        reg.clear_channel(1).unwrap();
        reg.assign_port(2, 3, true, false).unwrap();
    }

    #[test]
    fn test_assign_rejects_missing_pins() {
        let mut reg = registry();
        assert_eq!(reg.assign_port(0, 0, true, false), Err(MapError::Channel));
        assert_eq!(reg.assign_port(1, 9, true, false), Err(MapError::Port));
        assert_eq!(reg.assign_port(1, 16, true, false), Err(MapError::Port));
        assert_eq!(reg.assign_port(1, 4, true, false), Err(MapError::Port));
        reg.assign_port(1, 4, false, false).unwrap();
    }

    #[test]
    fn test_channel_value_writes_pin() {
        let mut reg = registry();
        reg.assign_port(1, 2, true, true).unwrap();
        reg.assign_port(2, 0, true, true).unwrap();
        let write = reg.set_channel_value(1, 128).unwrap().unwrap();
        assert_eq!(write.pin, 6);
        assert_eq!(write.value, PinValue::Pwm(crate::logic::perceptual(128)));
        // Log-Flag wirkt nicht auf digitale Ports
        let write = reg.set_channel_value(2, 200).unwrap().unwrap();
        assert_eq!(write.value, PinValue::Digital(true));
        assert_eq!(reg.set_channel_value(3, 1), Err(MapError::Channel));
    }

    #[test]
    fn test_input_channel_has_no_write() {
        let mut reg = registry();
        reg.assign_port(1, 4, false, false).unwrap();
        assert_eq!(reg.set_channel_value(1, 50), Ok(None));
        assert_eq!(reg.lookup(1).unwrap().value, 50);
    }

    #[test]
    fn test_port_value_updates_channel() {
        let mut reg = registry();
        reg.assign_port(5, 1, true, false).unwrap();
        let write = reg.set_port_value(1, 255).unwrap();
        assert_eq!(write.pin, 5);
        assert_eq!(reg.lookup(5).unwrap().value, 255);
        assert_eq!(reg.set_port_value(4, 1), Err(MapError::Port));
    }

    #[test]
    fn test_off_zeroes_every_output() {
        let mut reg = registry();
        reg.assign_port(1, 0, true, false).unwrap();
        reg.set_channel_value(1, 200).unwrap();
        let writes = reg.off();
        assert_eq!(writes.len(), 4);
        assert!(writes.iter().all(|w| matches!(w.value, PinValue::Digital(false) | PinValue::Pwm(0))));
        assert_eq!(reg.lookup(1).unwrap().value, 0);
    }

    #[test]
    fn test_apply_run_skips_unmapped() {
        let mut reg = registry();
        reg.assign_port(2, 0, true, false).unwrap();
        let writes = reg.apply_run(&[9, 200, 9]);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].pin, 4);
        assert_eq!(writes[0].value, PinValue::Digital(true));
    }

    #[test]
    fn test_image_restore() {
        let mut reg = registry();
        reg.assign_port(1, 2, true, true).unwrap();
        reg.assign_port(48, 4, false, false).unwrap();
        let image = MapImage::from_bytes(reg.image().as_bytes()).unwrap();

        let mut fresh = registry();
        fresh.restore(&image).unwrap();
        assert_eq!(fresh.lookup(1), reg.lookup(1));
        assert_eq!(fresh.lookup(48), reg.lookup(48));
        assert_eq!(fresh.lookup(2), None);
    }

    #[test]
    fn test_image_rejects_damage() {
        let reg = registry();
        let mut bytes = [0u8; MAP_IMAGE_LEN];
        bytes.copy_from_slice(reg.image().as_bytes());
        bytes[10] ^= 0x01;
        assert_eq!(MapImage::from_bytes(&bytes), Err(StoreError::Corrupt));
        assert_eq!(MapImage::from_bytes(&[0xFF; MAP_IMAGE_LEN]), Err(StoreError::Corrupt));
        assert_eq!(MapImage::from_bytes(&bytes[..5]), Err(StoreError::Corrupt));
    }

    #[test]
    fn test_restore_rejects_foreign_port_table() {
        let mut reg = registry();
        reg.assign_port(1, 3, true, false).unwrap();
        let image = reg.image();

        let mut other = NodeRegistry::new(PortTable::from_slice(&[PinMapping::digital_out(4)]));
        assert_eq!(other.restore(&image), Err(StoreError::Corrupt));
        assert_eq!(other.lookup(1), None);
    }
}
