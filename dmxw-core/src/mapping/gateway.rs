//! Zuordnungstabelle des Gateways

use crate::consts::{MAX_DMX512_CHANS, MAX_DMXW_CHANS, MAX_PORTS};
use crate::packet::RunValues;
use crate::types::{Address, NodeId};

use super::{MapError, channel_index};

/// Ein DMXW-Kanal, gebunden an DMX-512-Kanal, Node und Port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GatewayMapping {
    pub dmxw_chan: u8,
    pub dmx512_chan: u16,
    pub node: NodeId,
    pub port: u8,
    pub logarithmic: bool,
    /// Zuletzt gesehener Wert
    pub value: u8,
}

impl GatewayMapping {
    fn same_target(&self, other: &GatewayMapping) -> bool {
        self.node == other.node && self.port == other.port && self.dmx512_chan == other.dmx512_chan
    }
}

/// Besitzt alle DMXW-Zuordnungen des Gateways
///
/// Pro DMXW-Kanal höchstens eine Zuordnung, und kein (Node, Port) Paar
/// wird von zwei Kanälen referenziert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRegistry {
    slots: [Option<GatewayMapping>; MAX_DMXW_CHANS],
}

impl Default for GatewayRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayRegistry {
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_DMXW_CHANS],
        }
    }

    pub fn map_channel(
        &mut self,
        dmxw_chan: u8,
        dmx512_chan: u16,
        node: NodeId,
        port: u8,
        logarithmic: bool,
    ) -> Result<(), MapError> {
        let index = channel_index(dmxw_chan).ok_or(MapError::Channel)?;
        if dmx512_chan as usize >= MAX_DMX512_CHANS {
            return Err(MapError::Channel);
        }
        if port as usize >= MAX_PORTS {
            return Err(MapError::Port);
        }

        let port_taken = self
            .iter()
            .any(|m| m.dmxw_chan != dmxw_chan && m.node == node && m.port == port);
        if port_taken {
            return Err(MapError::Port);
        }

        let mapping = GatewayMapping {
            dmxw_chan,
            dmx512_chan,
            node,
            port,
            logarithmic,
            value: 0,
        };
        let slot = &mut self.slots[index];
        match slot {
            Some(existing) if existing.same_target(&mapping) => {
                existing.logarithmic = logarithmic;
            }
            Some(_) => return Err(MapError::Channel),
            None => *slot = Some(mapping),
        }
        debug!("gateway: mapped dmxw {} -> dmx512 {}", dmxw_chan, dmx512_chan);
        Ok(())
    }

    /// Entfernt die Zuordnung und liefert sie zurück
    pub fn unmap_channel(&mut self, dmxw_chan: u8) -> Option<GatewayMapping> {
        channel_index(dmxw_chan).and_then(|i| self.slots[i].take())
    }

    /// Entfernt alle Zuordnungen einer Node (oder aller Nodes bei Broadcast)
    pub fn clear_all(&mut self, target: Address) -> usize {
        let mut removed = 0;
        for slot in self.slots.iter_mut() {
            if slot.is_some_and(|m| target.includes(m.node)) {
                *slot = None;
                removed += 1;
            }
        }
        removed
    }

    pub fn lookup(&self, dmxw_chan: u8) -> Option<GatewayMapping> {
        channel_index(dmxw_chan).and_then(|i| self.slots[i])
    }

    /// Setzt einen Slot auf einen früheren Stand zurück
    pub(crate) fn restore(&mut self, dmxw_chan: u8, previous: Option<GatewayMapping>) {
        if let Some(i) = channel_index(dmxw_chan) {
            self.slots[i] = previous;
        }
    }

    pub fn set_port_value(&mut self, node: NodeId, port: u8, value: u8) -> Result<(), MapError> {
        let mapping = self
            .slots
            .iter_mut()
            .flatten()
            .find(|m| m.node == node && m.port == port)
            .ok_or(MapError::Port)?;
        mapping.value = value;
        Ok(())
    }

    pub fn set_channel_value(&mut self, dmxw_chan: u8, value: u8) -> Result<(), MapError> {
        let index = channel_index(dmxw_chan).ok_or(MapError::Channel)?;
        let mapping = self.slots[index].as_mut().ok_or(MapError::Channel)?;
        mapping.value = value;
        Ok(())
    }

    /// Übernimmt ein DMX-512 Universum (Index 0 = Kanal 0)
    ///
    /// Zuordnungen auf Kanäle jenseits des Frame-Endes behalten ihren Wert.
    pub fn ingest_dmx512(&mut self, universe: &[u8]) {
        for mapping in self.slots.iter_mut().flatten() {
            if let Some(&value) = universe.get(mapping.dmx512_chan as usize) {
                mapping.value = value;
            }
        }
    }

    /// Werte aller DMXW-Kanäle für den `CMD_RUN` Broadcast (frei = 0)
    pub fn run_values(&self) -> RunValues {
        self.slots
            .iter()
            .map(|slot| slot.map_or(0, |m| m.value))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GatewayMapping> {
        self.slots.iter().flatten()
    }

    pub fn mappings_for(&self, node: NodeId) -> impl Iterator<Item = &GatewayMapping> {
        self.iter().filter(move |m| m.node == node)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
