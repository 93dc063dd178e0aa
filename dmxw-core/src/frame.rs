//! Frame-Codec für die serielle Verbindung HMI ↔ Output-Prozessor
//!
//! Layout: `STX STX SEQ <escaped payload> ETX CRC8`
//!
//! - Nutzdaten-Bytes 253, 254 und 255 werden als `ESC, wert` übertragen.
//! - `SEQ` steht vor dem escapten Bereich und wird nie escaped. Eine Folge
//!   von STX vor `SEQ` gilt als Präambel, daher ist 254 als SEQ reserviert.
//! - CRC-8 (Maxim/Dallas) über `SEQ` und die *unescapten* Nutzdaten.
//!
//! Der Empfänger ist ein Byte-für-Byte Zustandsautomat ([`FrameDecoder`]).
//! Er blockiert nie und kann Frames über beliebig viele Aufrufe hinweg
//! zusammensetzen.

use crc::{CRC_8_MAXIM_DOW, Crc};
use heapless::Vec;

use crate::consts::{CHAR_ESC, CHAR_ETX, CHAR_STX, MAX_SERIAL_BUF_LEN, TSTCMD_UNDEF};

/// Längster mögliche Frame: alle Nutzdaten escaped
pub const MAX_FRAME_LEN: usize = 2 + 1 + 2 * MAX_SERIAL_BUF_LEN + 2;

pub type Payload = Vec<u8, MAX_SERIAL_BUF_LEN>;
pub type FrameBytes = Vec<u8, MAX_FRAME_LEN>;

pub(crate) const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_MAXIM_DOW);

/// Prüfsumme über Sequenznummer und logische (unescapte) Nutzdaten
pub fn checksum(seq: u8, payload: &[u8]) -> u8 {
    let mut digest = CRC8.digest();
    digest.update(&[seq]);
    digest.update(payload);
    digest.finalize()
}

const fn is_reserved(byte: u8) -> bool {
    byte >= CHAR_ESC
}

/// Ein vollständig empfangener und geprüfter Frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u8,
    pub payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Frame vollständig, aber CRC falsch. `cmd` ist das erste Nutzdaten-Byte
    /// (oder `TSTCMD_UNDEF`), damit der Empfänger gezielt NACKen kann.
    ChecksumMismatch { seq: u8, cmd: u8 },
    /// Unescaptes STX mitten im Frame
    Framing,
    /// Nutzdaten länger als `MAX_SERIAL_BUF_LEN`
    Overflow,
    /// 254 kann nicht als Sequenznummer gesendet werden
    ReservedSequence,
}

/// Ergebnis von [`FrameDecoder::feed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedResult {
    Incomplete,
    Frame(Frame),
    Error(FrameError),
}

/// Zustände des Empfängers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    /// Sucht das erste STX
    Seek,
    /// Erwartet das zweite STX
    Seek2,
    SeqNum,
    Collect,
    /// ESC gelesen, nächstes Byte ist ein Literal
    EscPending,
    Crc,
    /// Nach Fehler: verwirft alles bis zum nächsten STX
    Purge,
}

/// Kodiert einen Frame
///
/// # Beispiele
///
/// ```
/// # use dmxw_core::frame::{encode, checksum};
/// let frame = encode(5, &[1, 253, 9]).unwrap();
/// assert_eq!(&frame[..8], &[254, 254, 5, 1, 253, 253, 9, 255]);
/// assert_eq!(frame[8], checksum(5, &[1, 253, 9]));
/// ```
pub fn encode(seq: u8, payload: &[u8]) -> Result<FrameBytes, FrameError> {
    if seq == CHAR_STX {
        return Err(FrameError::ReservedSequence);
    }
    if payload.len() > MAX_SERIAL_BUF_LEN {
        return Err(FrameError::Overflow);
    }

    let mut out = FrameBytes::new();
    put(&mut out, CHAR_STX)?;
    put(&mut out, CHAR_STX)?;
    put(&mut out, seq)?;
    for &byte in payload {
        if is_reserved(byte) {
            put(&mut out, CHAR_ESC)?;
        }
        put(&mut out, byte)?;
    }
    put(&mut out, CHAR_ETX)?;
    put(&mut out, checksum(seq, payload))?;
    Ok(out)
}

fn put(out: &mut FrameBytes, byte: u8) -> Result<(), FrameError> {
    out.push(byte).map_err(|_| FrameError::Overflow)
}

/// Empfangs-Zustandsautomat
///
/// Fehler werden lokal behandelt: der Decoder springt in `Purge` und
/// synchronisiert sich am nächsten STX-Paar neu, ohne Verbindungs-Reset.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    state: RxState,
    seq: u8,
    buf: Payload,
    // Letztes Roh-Byte war STX (auch wenn es als Literal nach ESC kam)
    prev_stx: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            state: RxState::Seek,
            seq: 0,
            buf: Vec::new(),
            prev_stx: false,
        }
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RxState::Seek;
        self.buf.clear();
        self.prev_stx = false;
    }

    /// Eingangspuffer ist leer gelaufen: ein laufender Purge ist beendet
    pub fn idle(&mut self) {
        if self.state == RxState::Purge {
            self.state = RxState::Seek;
        }
    }

    /// Verarbeitet genau ein empfangenes Byte
    pub fn feed(&mut self, byte: u8) -> FeedResult {
        let result = self.step(byte);
        self.prev_stx = byte == CHAR_STX;
        result
    }

    fn step(&mut self, byte: u8) -> FeedResult {
        match self.state {
            RxState::Seek => {
                if byte == CHAR_STX {
                    self.state = RxState::Seek2;
                }
                FeedResult::Incomplete
            }
            RxState::Seek2 => {
                self.state = if byte == CHAR_STX {
                    RxState::SeqNum
                } else {
                    RxState::Seek
                };
                FeedResult::Incomplete
            }
            RxState::SeqNum => {
                if byte != CHAR_STX {
                    self.seq = byte;
                    self.buf.clear();
                    self.state = RxState::Collect;
                }
                FeedResult::Incomplete
            }
            RxState::Collect => match byte {
                CHAR_ESC => {
                    self.state = RxState::EscPending;
                    FeedResult::Incomplete
                }
                CHAR_ETX => {
                    self.state = RxState::Crc;
                    FeedResult::Incomplete
                }
                CHAR_STX => {
                    self.enter_purge();
                    self.purge(byte);
                    FeedResult::Error(FrameError::Framing)
                }
                _ => self.collect(byte),
            },
            RxState::EscPending => {
                self.state = RxState::Collect;
                self.collect(byte)
            }
            RxState::Crc => self.finish(byte),
            RxState::Purge => {
                self.purge(byte);
                FeedResult::Incomplete
            }
        }
    }

    fn collect(&mut self, byte: u8) -> FeedResult {
        if self.buf.push(byte).is_err() {
            self.enter_purge();
            return FeedResult::Error(FrameError::Overflow);
        }
        FeedResult::Incomplete
    }

    fn finish(&mut self, crc: u8) -> FeedResult {
        if crc == checksum(self.seq, &self.buf) {
            self.state = RxState::Seek;
            let payload = core::mem::take(&mut self.buf);
            return FeedResult::Frame(Frame {
                seq: self.seq,
                payload,
            });
        }

        if crc == CHAR_STX {
            // Kein gültiger CRC: das STX beginnt wohl einen neuen Frame
            self.enter_purge();
            self.purge(crc);
            return FeedResult::Error(FrameError::Framing);
        }

        let cmd = self.buf.first().copied().unwrap_or(TSTCMD_UNDEF);
        self.state = RxState::Seek;
        self.buf.clear();
        FeedResult::Error(FrameError::ChecksumMismatch { seq: self.seq, cmd })
    }

    fn enter_purge(&mut self) {
        self.buf.clear();
        self.state = RxState::Purge;
    }

    fn purge(&mut self, byte: u8) {
        if byte != CHAR_STX {
            return;
        }
        // Ein STX direkt davor (als Literal verschluckt) bildet mit diesem das Paar
        self.state = if self.prev_stx {
            RxState::SeqNum
        } else {
            RxState::Seek2
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(decoder: &mut FrameDecoder, bytes: &[u8]) -> (Option<Frame>, usize) {
        let mut frame = None;
        let mut errors = 0;
        for &b in bytes {
            match decoder.feed(b) {
                FeedResult::Frame(f) => frame = Some(f),
                FeedResult::Error(_) => errors += 1,
                FeedResult::Incomplete => {}
            }
        }
        (frame, errors)
    }

    #[test]
    fn test_encode_escapes_reserved_bytes() {
        let frame = encode(5, &[1, 253, 9]).unwrap();
        let crc = checksum(5, &[1, 253, 9]);
        assert_eq!(&frame[..], &[254, 254, 5, 1, 253, 253, 9, 255, crc]);
    }

    #[test]
    fn test_encode_does_not_escape_sequence() {
        let frame = encode(255, &[7]).unwrap();
        assert_eq!(&frame[..4], &[254, 254, 255, 7]);
    }

    #[test]
    fn test_encode_rejects_stx_sequence() {
        assert_eq!(encode(254, &[1]), Err(FrameError::ReservedSequence));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let payload = [0u8; MAX_SERIAL_BUF_LEN + 1];
        assert_eq!(encode(1, &payload), Err(FrameError::Overflow));
    }

    #[test]
    fn test_checksum_covers_sequence() {
        assert_ne!(checksum(1, &[1, 2, 3]), checksum(2, &[1, 2, 3]));
    }

    #[test]
    fn test_decode_concrete_frame() {
        let mut decoder = FrameDecoder::new();
        let bytes = encode(5, &[1, 253, 9]).unwrap();
        let (frame, errors) = decode_all(&mut decoder, &bytes);
        let frame = frame.unwrap();
        assert_eq!(errors, 0);
        assert_eq!(frame.seq, 5);
        assert_eq!(&frame.payload[..], &[1, 253, 9]);
        assert_eq!(decoder.state(), RxState::Seek);
    }

    #[test]
    fn test_decode_state_progression() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(CHAR_STX);
        assert_eq!(decoder.state(), RxState::Seek2);
        decoder.feed(CHAR_STX);
        assert_eq!(decoder.state(), RxState::SeqNum);
        decoder.feed(3);
        assert_eq!(decoder.state(), RxState::Collect);
        decoder.feed(CHAR_ESC);
        assert_eq!(decoder.state(), RxState::EscPending);
        decoder.feed(CHAR_ETX);
        assert_eq!(decoder.state(), RxState::Collect);
        decoder.feed(CHAR_ETX);
        assert_eq!(decoder.state(), RxState::Crc);
    }

    #[test]
    fn test_seek2_falls_back_on_non_stx() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(CHAR_STX);
        decoder.feed(0x10);
        assert_eq!(decoder.state(), RxState::Seek);
    }

    #[test]
    fn test_checksum_mismatch_reports_command() {
        let mut decoder = FrameDecoder::new();
        let mut bytes = encode(9, &[4, 1, 2]).unwrap();
        let last = bytes.len() - 1;
        bytes[last] = bytes[last].wrapping_add(1);
        if bytes[last] == CHAR_STX {
            bytes[last] = bytes[last].wrapping_add(1);
        }
        let mut result = FeedResult::Incomplete;
        for &b in bytes.iter() {
            result = decoder.feed(b);
        }
        assert_eq!(
            result,
            FeedResult::Error(FrameError::ChecksumMismatch { seq: 9, cmd: 4 })
        );
    }

    #[test]
    fn test_unescaped_stx_in_payload_purges() {
        let mut decoder = FrameDecoder::new();
        for &b in &[CHAR_STX, CHAR_STX, 1, 2] {
            decoder.feed(b);
        }
        assert_eq!(
            decoder.feed(CHAR_STX),
            FeedResult::Error(FrameError::Framing)
        );
        // Das STX zählt als Beginn eines neuen Paares
        assert_eq!(decoder.state(), RxState::Seek2);
    }

    #[test]
    fn test_overflow_forces_purge() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(CHAR_STX);
        decoder.feed(CHAR_STX);
        decoder.feed(1);
        for _ in 0..MAX_SERIAL_BUF_LEN {
            assert_eq!(decoder.feed(7), FeedResult::Incomplete);
        }
        assert_eq!(decoder.feed(7), FeedResult::Error(FrameError::Overflow));
        assert_eq!(decoder.state(), RxState::Purge);

        decoder.idle();
        assert_eq!(decoder.state(), RxState::Seek);
    }

    #[test]
    fn test_max_payload_round_trip() {
        let payload = [CHAR_ETX; MAX_SERIAL_BUF_LEN];
        let bytes = encode(200, &payload).unwrap();
        assert_eq!(bytes.len(), MAX_FRAME_LEN);
        let mut decoder = FrameDecoder::new();
        let (frame, _) = decode_all(&mut decoder, &bytes);
        assert_eq!(&frame.unwrap().payload[..], &payload[..]);
    }

    #[test]
    fn test_split_feed_across_calls() {
        let bytes = encode(42, &[5, 254, 6]).unwrap();
        let mut decoder = FrameDecoder::new();
        let (first, _) = decode_all(&mut decoder, &bytes[..4]);
        assert!(first.is_none());
        let (second, _) = decode_all(&mut decoder, &bytes[4..]);
        assert_eq!(&second.unwrap().payload[..], &[5, 254, 6]);
    }
}
