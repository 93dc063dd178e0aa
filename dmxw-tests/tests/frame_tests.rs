//! Integration Tests für den Frame-Codec
//!
//! Round-Trip, Bit-Fehler und Resynchronisation nach Müll auf der Leitung

use dmxw_core::consts::{CHAR_ESC, CHAR_ETX, CHAR_STX, MAX_SERIAL_BUF_LEN};
use dmxw_core::frame::{checksum, encode};
use dmxw_core::{FeedResult, Frame, FrameDecoder, FrameError, RxState};

/// Kleiner deterministischer Zufallsgenerator
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u8 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (self.0 >> 16) as u8
    }
}

fn decode(bytes: &[u8]) -> Vec<FeedResult> {
    let mut decoder = FrameDecoder::new();
    bytes
        .iter()
        .map(|&b| decoder.feed(b))
        .filter(|r| *r != FeedResult::Incomplete)
        .collect()
}

fn frames(results: &[FeedResult]) -> Vec<Frame> {
    results
        .iter()
        .filter_map(|r| match r {
            FeedResult::Frame(f) => Some(f.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Tests: Round-Trip
// ============================================================================

#[test]
fn test_concrete_frame_bytes() {
    let bytes = encode(5, &[1, 253, 9]).unwrap();
    let crc = checksum(5, &[1, 253, 9]);
    assert_eq!(
        &bytes[..],
        &[CHAR_STX, CHAR_STX, 5, 1, CHAR_ESC, 253, 9, CHAR_ETX, crc]
    );

    let results = decode(&bytes);
    assert_eq!(results.len(), 1);
    let frame = &frames(&results)[0];
    assert_eq!(frame.seq, 5);
    assert_eq!(&frame.payload[..], &[1, 253, 9]);
}

#[test]
fn test_checksum_is_crc8_maxim() {
    // Prüfwert des CRC-8/MAXIM Katalogs ("123456789")
    assert_eq!(checksum(b'1', b"23456789"), 0xA1);
}

#[test]
fn test_round_trip_reserved_byte_mixtures() {
    let mut rng = Lcg(42);
    for round in 0..300usize {
        let len = round % (MAX_SERIAL_BUF_LEN + 1);
        let payload: Vec<u8> = (0..len)
            .map(|_| match rng.next() % 3 {
                0 => 253 + rng.next() % 3,
                _ => rng.next(),
            })
            .collect();
        let seq = match rng.next() {
            CHAR_STX => 0,
            seq => seq,
        };

        let bytes = encode(seq, &payload).unwrap();
        let results = decode(&bytes);
        assert_eq!(results.len(), 1, "round {}", round);
        let frame = &frames(&results)[0];
        assert_eq!(frame.seq, seq);
        assert_eq!(&frame.payload[..], &payload[..]);
    }
}

#[test]
fn test_back_to_back_frames() {
    let mut stream = Vec::new();
    for seq in 0..10u8 {
        stream.extend_from_slice(&encode(seq, &[seq, 255, seq]).unwrap());
    }
    let decoded = frames(&decode(&stream));
    assert_eq!(decoded.len(), 10);
    for (seq, frame) in decoded.iter().enumerate() {
        assert_eq!(frame.seq, seq as u8);
        assert_eq!(&frame.payload[..], &[seq as u8, 255, seq as u8]);
    }
}

// ============================================================================
// Tests: Fehlererkennung
// ============================================================================

/// Gilt nur für diese Nutzdaten: Ein Bit-Fehler, der ein ESC/ETX erzeugt
/// oder entfernt, ändert die Länge, und dann kann CRC-8 kollidieren.
#[test]
fn test_single_bit_flips_in_sample_frames_detected() {
    let cases: [(u8, &[u8]); 6] = [
        (5, &[1, 253, 9]),
        (0, &[]),
        (17, &[253, 254, 255]),
        (200, &[0, 1, 2, 3, 255, 128, 254, 7]),
        (255, &[7, 7, 7]),
        (1, &[4, 1, 2, 2, 255, 3, 200]),
    ];
    for (seq, payload) in cases {
        let bytes = encode(seq, payload).unwrap();
        for index in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[index] ^= 1 << bit;
                for frame in frames(&decode(&corrupted)) {
                    assert_eq!(
                        (frame.seq, &frame.payload[..]),
                        (seq, payload),
                        "byte {} bit {} decoded to a wrong frame",
                        index,
                        bit
                    );
                }
            }
        }
    }
}

#[test]
fn test_recovers_after_corrupted_frame() {
    let good = encode(9, &[1, 2, 3]).unwrap();
    let bytes = encode(200, &[0, 1, 2, 3, 255, 128, 254, 7]).unwrap();
    for index in 0..bytes.len() {
        for bit in 0..8 {
            let mut stream = bytes.to_vec();
            stream[index] ^= 1 << bit;
            stream.extend_from_slice(&good);

            let decoded = frames(&decode(&stream));
            let last = decoded.last().expect("good frame lost");
            assert_eq!(last.seq, 9);
            assert_eq!(&last.payload[..], &[1, 2, 3]);
        }
    }
}

#[test]
fn test_bad_checksum_reported() {
    let mut bytes = encode(3, &[2, 0]).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    assert_eq!(
        decode(&bytes),
        vec![FeedResult::Error(FrameError::ChecksumMismatch { seq: 3, cmd: 2 })]
    );
}

// ============================================================================
// Tests: Resynchronisation
// ============================================================================

#[test]
fn test_resync_after_garbage() {
    let frame = encode(9, &[1, 2, 3]).unwrap();
    let mut rng = Lcg(7);

    for round in 0..500usize {
        let mut decoder = FrameDecoder::new();
        for _ in 0..round % 150 {
            // Reservierte Bytes bevorzugen, die stören am meisten
            let byte = match rng.next() % 4 {
                0 => CHAR_STX,
                1 => CHAR_ESC,
                2 => CHAR_ETX,
                _ => rng.next(),
            };
            decoder.feed(byte);
        }

        let mut last = None;
        for &b in &frame {
            if let FeedResult::Frame(f) = decoder.feed(b) {
                last = Some(f);
            }
        }
        let last = last.unwrap_or_else(|| panic!("round {}: frame lost", round));
        assert_eq!(last.seq, 9);
        assert_eq!(&last.payload[..], &[1, 2, 3]);
    }
}

#[test]
fn test_stx_after_escape_restarts_frame() {
    let mut decoder = FrameDecoder::new();
    for &b in &[CHAR_STX, CHAR_STX, 1, 7, CHAR_ESC] {
        decoder.feed(b);
    }
    // Das STX nach ESC wird als Literal gelesen, das nächste STX bildet
    // mit ihm ein neues Paar
    assert_eq!(decoder.feed(CHAR_STX), FeedResult::Incomplete);
    assert_eq!(decoder.feed(CHAR_STX), FeedResult::Error(FrameError::Framing));
    assert_eq!(decoder.state(), RxState::SeqNum);

    let good = encode(4, &[5]).unwrap();
    let mut result = FeedResult::Incomplete;
    for &b in &good[2..] {
        result = decoder.feed(b);
    }
    assert!(matches!(result, FeedResult::Frame(ref f) if f.seq == 4));
}

#[test]
fn test_idle_ends_purge() {
    let mut decoder = FrameDecoder::new();
    decoder.feed(CHAR_STX);
    decoder.feed(CHAR_STX);
    decoder.feed(1);
    for _ in 0..=MAX_SERIAL_BUF_LEN {
        decoder.feed(0x11);
    }
    assert_eq!(decoder.state(), RxState::Purge);
    decoder.feed(0x22);
    assert_eq!(decoder.state(), RxState::Purge);
    decoder.idle();
    assert_eq!(decoder.state(), RxState::Seek);
}
