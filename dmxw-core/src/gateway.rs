//! Gateway: Zuordnungstabelle + Funkverbindung
//!
//! Jede Operation prüft zuerst lokal gegen die Registry und schickt dann
//! das Kommando an die Node. Es gibt keinen automatischen Abgleich: eine
//! Node, die eine Änderung verpasst, bleibt abweichend bis [`Gateway::resync`].

use core::fmt;

use crate::link::{LinkError, WirelessLink};
use crate::mapping::{GatewayRegistry, MapError};
use crate::packet::{ChannelReport, Command};
use crate::traits::{CancelSignal, Clock, RadioTransport};
use crate::types::{AckCode, Address, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GatewayError {
    Map(MapError),
    Link(LinkError),
}

impl From<MapError> for GatewayError {
    fn from(err: MapError) -> Self {
        GatewayError::Map(err)
    }
}

impl From<LinkError> for GatewayError {
    fn from(err: LinkError) -> Self {
        GatewayError::Link(err)
    }
}

impl From<GatewayError> for AckCode {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Map(err) => err.into(),
            GatewayError::Link(err) => err.into(),
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Map(err) => write!(f, "{}", err),
            GatewayError::Link(err) => write!(f, "{}", err),
        }
    }
}

pub struct Gateway<R, C> {
    link: WirelessLink<R, C>,
    registry: GatewayRegistry,
}

impl<R: RadioTransport, C: Clock> Gateway<R, C> {
    pub fn new(link: WirelessLink<R, C>) -> Self {
        Self {
            link,
            registry: GatewayRegistry::new(),
        }
    }

    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    pub fn link(&self) -> &WirelessLink<R, C> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut WirelessLink<R, C> {
        &mut self.link
    }

    pub async fn ping(&mut self, node: NodeId, cancel: &impl CancelSignal) -> Result<(), GatewayError> {
        self.link.request(node, Command::Ping, cancel).await?;
        Ok(())
    }

    /// Ordnet einen DMXW-Kanal zu und überträgt die Zuordnung an die Node
    ///
    /// Lehnt die Node ab, wird die lokale Änderung zurückgenommen. Bei
    /// Timeout bleibt sie stehen.
    pub async fn map(
        &mut self,
        dmxw_chan: u8,
        dmx512_chan: u16,
        node: NodeId,
        port: u8,
        logarithmic: bool,
        cancel: &impl CancelSignal,
    ) -> Result<(), GatewayError> {
        let previous = self.registry.lookup(dmxw_chan);
        self.registry
            .map_channel(dmxw_chan, dmx512_chan, node, port, logarithmic)?;

        let command = Command::Map {
            chan: dmxw_chan,
            port,
            logarithmic,
        };
        match self.link.request(node, command, cancel).await {
            Ok(_) => Ok(()),
            Err(err @ LinkError::Rejected(_)) => {
                self.registry.restore(dmxw_chan, previous);
                Err(err.into())
            }
            Err(err) => {
                warn!("gateway: node {} may now diverge on dmxw {}", node.get(), dmxw_chan);
                Err(err.into())
            }
        }
    }

    pub async fn unmap(&mut self, dmxw_chan: u8, cancel: &impl CancelSignal) -> Result<(), GatewayError> {
        let mapping = self
            .registry
            .unmap_channel(dmxw_chan)
            .ok_or(MapError::Channel)?;
        self.link
            .request(mapping.node, Command::MapRemove { chan: dmxw_chan }, cancel)
            .await?;
        Ok(())
    }

    /// Löscht alle Zuordnungen einer Node, bei Broadcast ohne ACK
    pub async fn clear_all(&mut self, target: Address, cancel: &impl CancelSignal) -> Result<(), GatewayError> {
        let removed = self.registry.clear_all(target);
        debug!("gateway: cleared {} mappings", removed);
        self.command(target, Command::ClearAll, cancel).await
    }

    pub async fn echo(
        &mut self,
        node: NodeId,
        dmxw_chan: u8,
        cancel: &impl CancelSignal,
    ) -> Result<ChannelReport, GatewayError> {
        let reply = self
            .link
            .request(node, Command::Echo { chan: dmxw_chan }, cancel)
            .await?;
        match reply.command {
            Command::Chan(report) => Ok(report),
            _ => Err(GatewayError::Map(MapError::Channel)),
        }
    }

    pub async fn locate(&mut self, node: NodeId, cancel: &impl CancelSignal) -> Result<(), GatewayError> {
        self.link.request(node, Command::Locate, cancel).await?;
        Ok(())
    }

    pub async fn off(&mut self, target: Address, cancel: &impl CancelSignal) -> Result<(), GatewayError> {
        self.command(target, Command::Off, cancel).await
    }

    /// Setzt einen Port direkt, auch wenn kein Kanal auf ihn zeigt
    pub async fn set_port(
        &mut self,
        node: NodeId,
        port: u8,
        value: u8,
        cancel: &impl CancelSignal,
    ) -> Result<(), GatewayError> {
        // Ohne Zuordnung existiert der Wert nur auf der Node
        if self.registry.set_port_value(node, port, value).is_err() {
            debug!("gateway: port {} of node {} has no channel", port, node.get());
        }
        self.link
            .request(node, Command::Port { port, value }, cancel)
            .await?;
        Ok(())
    }

    pub async fn set_channel(
        &mut self,
        dmxw_chan: u8,
        value: u8,
        cancel: &impl CancelSignal,
    ) -> Result<(), GatewayError> {
        let mapping = self.registry.lookup(dmxw_chan).ok_or(MapError::Channel)?;
        self.registry.set_channel_value(dmxw_chan, value)?;
        self.link
            .request(mapping.node, Command::Ctrl { chan: dmxw_chan, value }, cancel)
            .await?;
        Ok(())
    }

    pub async fn save(&mut self, node: NodeId, cancel: &impl CancelSignal) -> Result<(), GatewayError> {
        self.link.request(node, Command::Save, cancel).await?;
        Ok(())
    }

    pub async fn test(&mut self, node: NodeId, cancel: &impl CancelSignal) -> Result<(), GatewayError> {
        self.link.request(node, Command::Test, cancel).await?;
        Ok(())
    }

    /// Übernimmt ein DMX-512 Universum und sendet den `CMD_RUN` Broadcast
    pub async fn run(&mut self, universe: &[u8]) -> Result<(), GatewayError> {
        self.registry.ingest_dmx512(universe);
        let values = self.registry.run_values();
        self.link.send(Address::Broadcast, Command::Run(values)).await?;
        Ok(())
    }

    /// Spielt die Zuordnungen einer Node neu ein
    ///
    /// `CMD_CLRALL` gefolgt von einem `CMD_MAP` pro Zuordnung. Liefert die
    /// Anzahl übertragener Zuordnungen.
    pub async fn resync(&mut self, node: NodeId, cancel: &impl CancelSignal) -> Result<usize, GatewayError> {
        self.link.request(node, Command::ClearAll, cancel).await?;

        let mut count = 0;
        for dmxw_chan in 1..=crate::consts::MAX_DMXW_CHANS as u8 {
            let Some(mapping) = self.registry.lookup(dmxw_chan) else {
                continue;
            };
            if mapping.node != node {
                continue;
            }
            let command = Command::Map {
                chan: mapping.dmxw_chan,
                port: mapping.port,
                logarithmic: mapping.logarithmic,
            };
            self.link.request(node, command, cancel).await?;
            count += 1;
        }
        info!("gateway: resynced {} mappings to node {}", count, node.get());
        Ok(count)
    }

    async fn command(
        &mut self,
        target: Address,
        command: Command,
        cancel: &impl CancelSignal,
    ) -> Result<(), GatewayError> {
        match target {
            Address::Broadcast => self.link.send(target, command).await?,
            Address::Node(node) => {
                self.link.request(node, command, cancel).await?;
            }
        }
        Ok(())
    }
}
