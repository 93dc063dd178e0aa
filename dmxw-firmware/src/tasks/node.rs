// Node Task - Funk-Kommandos empfangen und auf die Ports anwenden
use defmt::{error, info, warn};
use dmxw_core::traits::{Beacon, Clock, MappingStore, PinIo, RadioTransport};
use dmxw_core::{NodeDispatcher, WirelessLink};

use crate::config::NODE_POLL_MS;
use crate::hal::{EmbassyClock, EspNowRadio, FlashStore, GpioPins, LedBeacon};

pub type Node = NodeDispatcher<GpioPins<'static>, FlashStore<'static>, LedBeacon>;

pub type RadioLink = WirelessLink<EspNowRadio<'static>, EmbassyClock>;

/// Node Logic - Startet mit den gespeicherten Zuordnungen, dann Empfangs-Schleife
///
/// Ein defektes Abbild im Flash wird gemeldet, die Node startet dann leer.
pub async fn node_logic<P, S, B, R, C>(
    mut node: NodeDispatcher<P, S, B>,
    mut link: WirelessLink<R, C>,
) -> !
where
    P: PinIo,
    S: MappingStore,
    B: Beacon,
    R: RadioTransport,
    C: Clock,
{
    match node.startup() {
        Ok(true) => info!("Node {}: mappings restored", node.id().get()),
        Ok(false) => info!("Node {}: starting without mappings", node.id().get()),
        Err(e) => error!("Node {}: stored mappings unusable: {}", node.id().get(), e),
    }

    loop {
        if let Err(e) = node.poll(&mut link, NODE_POLL_MS).await {
            warn!("Node {}: reply not sent: {}", node.id().get(), e);
        }
    }
}

#[embassy_executor::task]
pub async fn node_task(node: Node, link: RadioLink) {
    node_logic(node, link).await
}
