//! Funkverbindung mit Adressierung, ACK-Wartezeit und Wiederholungen
//!
//! Unicast-Anfragen warten pro Versuch bis zu `ack_wait_ms` auf die
//! passende Antwort und werden bis zu `retries` mal wiederholt. Broadcasts
//! werden nie quittiert.

use core::fmt;

use crate::consts::{ACK_WAIT_TIME, TX_NUM_RETRIES};
use crate::packet::{Command, Packet, PacketError};
use crate::traits::{CancelSignal, Clock, RadioError, RadioTransport};
use crate::types::{AckCode, Address, NodeId};

/// Timing einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    pub ack_wait_ms: u32,
    /// Zusätzliche Versuche nach dem ersten
    pub retries: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ack_wait_ms: ACK_WAIT_TIME,
            retries: TX_NUM_RETRIES,
        }
    }
}

impl LinkConfig {
    pub fn attempts(&self) -> u32 {
        1 + self.retries as u32
    }

    /// Obergrenze der Blockierzeit einer Anfrage
    pub fn max_wait_ms(&self) -> u64 {
        self.ack_wait_ms as u64 * self.attempts() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// Keine Antwort nach allen Versuchen
    Timeout,
    /// Node hat mit einem Fehlercode quittiert
    Rejected(AckCode),
    /// Abbruch durch den Aufrufer
    Cancelled,
    Radio(RadioError),
}

impl From<RadioError> for LinkError {
    fn from(err: RadioError) -> Self {
        LinkError::Radio(err)
    }
}

impl From<LinkError> for AckCode {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Timeout => AckCode::ETime,
            LinkError::Rejected(code) => code,
            LinkError::Cancelled | LinkError::Radio(_) => AckCode::Err,
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Timeout => f.write_str("no acknowledgement after all retries"),
            LinkError::Rejected(code) => write!(f, "rejected: {}", code),
            LinkError::Cancelled => f.write_str("cancelled"),
            LinkError::Radio(err) => write!(f, "{}", err),
        }
    }
}

/// Verbindung einer Node (oder des Gateways) ins Funknetz
pub struct WirelessLink<R, C> {
    radio: R,
    clock: C,
    me: NodeId,
    config: LinkConfig,
}

impl<R: RadioTransport, C: Clock> WirelessLink<R, C> {
    pub fn new(me: NodeId, radio: R, clock: C) -> Self {
        Self::with_config(me, radio, clock, LinkConfig::default())
    }

    pub fn with_config(me: NodeId, radio: R, clock: C, config: LinkConfig) -> Self {
        Self {
            radio,
            clock,
            me,
            config,
        }
    }

    pub fn id(&self) -> NodeId {
        self.me
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Sendet ohne auf eine Antwort zu warten (Broadcasts, Antworten)
    pub async fn send(&mut self, dest: Address, command: Command) -> Result<(), LinkError> {
        let packet = Packet::new(self.me, dest, command);
        self.radio.send(&packet.encode()).await?;
        Ok(())
    }

    /// Unicast mit ACK
    ///
    /// Liefert das Antwortpaket (ACK mit `AckCode::Ok`, PONG oder CHAN).
    /// Ein ACK mit Fehlercode ergibt `LinkError::Rejected`.
    pub async fn request(
        &mut self,
        dest: NodeId,
        command: Command,
        cancel: &impl CancelSignal,
    ) -> Result<Packet, LinkError> {
        let bytes = Packet::new(self.me, dest, command.clone()).encode();

        for attempt in 1..=self.config.attempts() {
            if cancel.is_cancelled() {
                return Err(LinkError::Cancelled);
            }
            if attempt > 1 {
                debug!("link: retry {} to node {}", attempt - 1, dest.get());
            }
            self.radio.send(&bytes).await?;

            if let Some(reply) = self.await_reply(dest, &command, cancel).await? {
                return match reply.command {
                    Command::Ack { code, .. } if !code.is_ok() => Err(LinkError::Rejected(code)),
                    _ => Ok(reply),
                };
            }
        }

        warn!("link: node {} did not answer cmd {}", dest.get(), command.code());
        Err(LinkError::Timeout)
    }

    async fn await_reply(
        &mut self,
        from: NodeId,
        request: &Command,
        cancel: &impl CancelSignal,
    ) -> Result<Option<Packet>, LinkError> {
        let deadline = self.clock.now_ms() + self.config.ack_wait_ms as u64;
        loop {
            let now = self.clock.now_ms();
            if now >= deadline {
                return Ok(None);
            }
            if cancel.is_cancelled() {
                return Err(LinkError::Cancelled);
            }
            let remaining = (deadline - now) as u32;
            let Some(bytes) = self.radio.receive(remaining).await else {
                return Ok(None);
            };
            match self.accept(&bytes) {
                Some(Ok(packet)) if packet.src == from && packet.command.answers(request) => {
                    return Ok(Some(packet));
                }
                Some(Ok(packet)) => {
                    trace!("link: ignoring cmd {} while waiting", packet.command.code());
                }
                _ => {}
            }
        }
    }

    /// Wartet bis zu `timeout_ms` auf ein Paket für diese Node
    ///
    /// `None` bei Timeout und für Pakete, die als nie empfangen gelten
    /// (fremdes Ziel, beschädigter Header). Fehler mit Antwortpflicht
    /// werden zurückgegeben.
    pub async fn receive(&mut self, timeout_ms: u32) -> Option<Result<Packet, PacketError>> {
        let bytes = self.radio.receive(timeout_ms).await?;
        self.accept(&bytes)
    }

    fn accept(&self, bytes: &[u8]) -> Option<Result<Packet, PacketError>> {
        let for_me = |src: NodeId, dest: Address| src != self.me && dest.includes(self.me);
        match Packet::decode(bytes) {
            Ok(packet) => for_me(packet.src, packet.dest).then_some(Ok(packet)),
            Err(err) => match err.reply() {
                Some((src, dest, _, _)) if for_me(src, dest) => Some(Err(err)),
                _ => {
                    trace!("link: discarded packet");
                    None
                }
            },
        }
    }
}
