// ESP-NOW als Funk-Transport
//
// Alle Pakete gehen an die Broadcast-MAC, adressiert wird im Paket-Header.
// Ein vorangestelltes Netzwerk-ID Byte trennt DMXW-Netze auf demselben Kanal.

use defmt::{Debug2Format, debug, warn};
use dmxw_core::consts::NETWORKID;
use dmxw_core::packet::{MAX_PACKET_LEN, PacketBytes};
use dmxw_core::traits::{RadioError, RadioTransport};
use embassy_time::{Duration, Instant, with_deadline};
use esp_radio::esp_now::{BROADCAST_ADDRESS, EspNow};
use heapless::Vec;

pub struct EspNowRadio<'d> {
    esp_now: EspNow<'d>,
}

impl<'d> EspNowRadio<'d> {
    pub fn new(esp_now: EspNow<'d>) -> Self {
        Self { esp_now }
    }
}

impl RadioTransport for EspNowRadio<'_> {
    async fn send(&mut self, bytes: &[u8]) -> Result<(), RadioError> {
        let mut frame: Vec<u8, { MAX_PACKET_LEN + 1 }> = Vec::new();
        frame.push(NETWORKID).map_err(|_| RadioError::SendFailed)?;
        frame
            .extend_from_slice(bytes)
            .map_err(|_| RadioError::SendFailed)?;

        self.esp_now
            .send_async(&BROADCAST_ADDRESS, &frame)
            .await
            .map_err(|e| {
                warn!("radio: send failed: {}", Debug2Format(&e));
                RadioError::SendFailed
            })
    }

    async fn receive(&mut self, timeout_ms: u32) -> Option<PacketBytes> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        loop {
            let received = with_deadline(deadline, self.esp_now.receive_async()).await.ok()?;
            match received.data().split_first() {
                Some((&NETWORKID, packet)) => return PacketBytes::from_slice(packet).ok(),
                _ => debug!("radio: foreign frame dropped"),
            }
        }
    }
}
