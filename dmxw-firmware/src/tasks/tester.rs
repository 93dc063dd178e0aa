// Tester Task - Output-Prozessor am UART des HMI
//
// Drei Ereignisquellen in einer Schleife: UART-Bytes, der CMD_RUN Takt
// und der Sweep-Takt. Alles läuft im selben Task, die Session hat genau
// einen Besitzer.
use defmt::{Debug2Format, debug, warn};
use dmxw_core::traits::{Clock, PinIo, PixelRenderer, RadioTransport};
use dmxw_core::{OutputProcessor, WirelessLink};
use embassy_futures::select::{Either3, select3};
use embassy_time::{Duration, Ticker, with_timeout};
use esp_hal::Async;
use esp_hal::uart::{Uart, UartTx};

use crate::config::{IPC_IDLE_MS, IPC_READ_BUFFER_SIZE, RUN_INTERVAL_MS, SWEEP_INTERVAL_MS};
use crate::hal::{GpioPins, LedPixels};
use crate::tasks::node::RadioLink;

pub type Processor = OutputProcessor<GpioPins<'static>, LedPixels>;

async fn write_frame(tx: &mut UartTx<'static, Async>, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        match tx.write_async(bytes).await {
            Ok(written) => bytes = &bytes[written..],
            Err(e) => {
                warn!("Tester: UART write failed: {}", Debug2Format(&e));
                return;
            }
        }
    }
}

/// Tester Logic - Frames vom HMI quittieren, Werte an die Nodes senden
pub async fn tester_logic<P, X, R, C>(
    mut processor: OutputProcessor<P, X>,
    uart: Uart<'static, Async>,
    mut link: WirelessLink<R, C>,
) -> !
where
    P: PinIo,
    X: PixelRenderer,
    R: RadioTransport,
    C: Clock,
{
    let (mut rx, mut tx) = uart.split();
    let mut run_ticker = Ticker::every(Duration::from_millis(RUN_INTERVAL_MS));
    let mut sweep_ticker = Ticker::every(Duration::from_millis(SWEEP_INTERVAL_MS));
    let mut buffer = [0u8; IPC_READ_BUFFER_SIZE];

    loop {
        let event = select3(
            with_timeout(
                Duration::from_millis(IPC_IDLE_MS),
                rx.read_async(&mut buffer),
            ),
            run_ticker.next(),
            sweep_ticker.next(),
        )
        .await;

        match event {
            Either3::First(Ok(Ok(count))) => {
                for &byte in &buffer[..count] {
                    if let Some(ack) = processor.feed(byte) {
                        write_frame(&mut tx, &ack).await;
                    }
                }
            }
            Either3::First(Ok(Err(e))) => {
                warn!("Tester: UART read failed: {}", Debug2Format(&e));
                processor.idle();
            }
            // Leitung ruhig
            Either3::First(Err(_)) => processor.idle(),
            Either3::Second(()) => {
                if let Some(packet) = processor.run_packet()
                    && let Err(e) = link.send(packet.dest, packet.command).await
                {
                    warn!("Tester: run broadcast failed: {}", e);
                }
            }
            Either3::Third(()) => {
                if let Some(chan) = processor.sweep_tick() {
                    debug!("Tester: sweep at channel {}", chan);
                }
            }
        }
    }
}

#[embassy_executor::task]
pub async fn tester_task(processor: Processor, uart: Uart<'static, Async>, link: RadioLink) {
    tester_logic(processor, uart, link).await
}
