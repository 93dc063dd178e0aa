// Keine Standard-Bibliothek verwenden (Embedded System)
#![no_std]
// Kein normaler main() Einstiegspunkt (wird von esp_rtos bereitgestellt)
#![no_main]
// Verbiete mem::forget - gefährlich bei ESP HAL Types mit DMA-Buffern
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
// Verbiete große Stack-Frames (Stack ist auf Embedded Systemen begrenzt)
#![deny(clippy::large_stack_frames)]

// Heap Allocator (Funk-Treiber benötigt dynamischen Speicher)
extern crate alloc;

// Embassy Async Runtime
use defmt::info;
use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};

// ESP32-C6 HAL
use esp_hal::clock::CpuClock;
use esp_hal::gpio::interconnect::PeripheralOutput;
use esp_hal::gpio::{Input, InputConfig, InputPin, Level, Output, OutputConfig, OutputPin, Pull};
use esp_hal::ledc::channel::{self, ChannelIFace};
use esp_hal::ledc::timer::{self, TimerIFace};
use esp_hal::ledc::{LSGlobalClkSource, Ledc, LowSpeed};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};
use esp_radio::wifi::{ClientConfig, ModeConfig};
use esp_storage::FlashStorage;
use static_cell::StaticCell;

// Backtrace bei Panic und println!() Support
use {esp_backtrace as _, esp_println as _};

// Projekt-Module und Konfiguration
use dmxw_core::{NodeDispatcher, NodeId, OutputProcessor, WirelessLink};
use dmxw_firmware::config::{
    IPC_BAUDRATE, MAP_STORE_OFFSET, NODE_ID, ONBOARD, PIXEL_MAX_LEN, PWM_FREQUENCY_KHZ,
    RADIO_CHANNEL, RADIO_HEAP_SIZE, ROLE, Role, node_ports,
};
use dmxw_firmware::hal::{
    EmbassyClock, EspNowRadio, FlashStore, GpioPins, LedBeacon, LedPixels, PinDriver,
};
use dmxw_firmware::LedCommandChannel;
use dmxw_firmware::tasks::{led_task, node_task, tester_task};

// ESP-IDF App Descriptor - erforderlich für den Bootloader!
// Ohne diesen schlägt das Flashen mit "ESP-IDF App Descriptor missing" fehl
esp_bootloader_esp_idf::esp_app_desc!();

fn digital_out(pin: impl OutputPin + 'static) -> PinDriver<'static> {
    PinDriver::Digital(Output::new(pin, Level::Low, OutputConfig::default()))
}

fn digital_in(pin: impl InputPin + 'static) -> PinDriver<'static> {
    PinDriver::Input(Input::new(pin, InputConfig::default().with_pull(Pull::Down)))
}

/// PWM-Kanal mit 0 % Duty am gemeinsamen LEDC-Timer
fn pwm_out(
    ledc: &'static Ledc<'static>,
    timer: &'static timer::Timer<'static, LowSpeed>,
    number: channel::Number,
    pin: impl PeripheralOutput<'static>,
) -> PinDriver<'static> {
    let mut pwm = ledc.channel(number, pin);
    pwm.configure(channel::config::Config {
        timer,
        duty_pct: 0,
        pin_config: channel::config::PinConfig::PushPull,
    })
    .expect("Failed to configure PWM channel");
    PinDriver::Pwm(pwm)
}

/// Main Entry Point
///
/// Initialisiert Hardware und Funk, startet Embassy Runtime und spawnt
/// die Tasks der gewählten Rolle. Danach schläft main().
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    // ESP32-C6 Konfiguration: CPU auf maximale Taktfrequenz (160 MHz)
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Heap Allocator initialisieren (Funk-Treiber braucht dynamischen Speicher!)
    esp_alloc::heap_allocator!(
        #[esp_hal::ram(reclaimed)]
        size: RADIO_HEAP_SIZE
    );

    // Embassy Runtime initialisieren (Timer + Software Interrupt)
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let sw_interrupt =
        esp_hal::interrupt::software::SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);
    esp_rtos::start(timg0.timer0, sw_interrupt.software_interrupt0);

    info!("DMXW: starting as {} on radio channel {}", ROLE, RADIO_CHANNEL);

    // Funk initialisieren: WiFi im Station-Modus, ohne Verbindung, nur ESP-NOW
    static RADIO_INIT: StaticCell<esp_radio::Controller> = StaticCell::new();
    let radio_init =
        RADIO_INIT.init(esp_radio::init().expect("Failed to initialize Wi-Fi/BLE controller"));

    let (mut wifi_controller, interfaces) =
        esp_radio::wifi::new(radio_init, peripherals.WIFI, Default::default())
            .expect("Failed to initialize Wi-Fi");
    wifi_controller
        .set_config(&ModeConfig::Client(ClientConfig::default()))
        .expect("Failed to configure Wi-Fi");
    wifi_controller
        .start_async()
        .await
        .expect("Failed to start Wi-Fi");

    let esp_now = interfaces.esp_now;
    esp_now
        .set_channel(RADIO_CHANNEL)
        .expect("Failed to set ESP-NOW channel");
    let radio = EspNowRadio::new(esp_now);

    // PWM: ein LEDC-Timer für alle analogen Ausgänge
    static LEDC: StaticCell<Ledc<'static>> = StaticCell::new();
    let ledc = LEDC.init(Ledc::new(peripherals.LEDC));
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);

    static PWM_TIMER: StaticCell<timer::Timer<'static, LowSpeed>> = StaticCell::new();
    let pwm_timer = PWM_TIMER.init(ledc.timer::<LowSpeed>(timer::Number::Timer0));
    pwm_timer
        .configure(timer::config::Config {
            duty: timer::config::Duty::Duty8Bit,
            clock_source: timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(PWM_FREQUENCY_KHZ),
        })
        .expect("Failed to configure PWM timer");
    let ledc: &'static Ledc<'static> = ledc;
    let pwm_timer: &'static timer::Timer<'static, LowSpeed> = pwm_timer;

    // LED Command-Channel (Beacon bzw. Pixel-Strip → LED Task)
    static LED_CHANNEL: StaticCell<LedCommandChannel> = StaticCell::new();
    let led_channel: &'static LedCommandChannel = LED_CHANNEL.init(LedCommandChannel::new());

    match ROLE {
        Role::Node => {
            // Pins passend zu config::node_ports()
            let pins = GpioPins::new()
                .with(0, digital_out(peripherals.GPIO0))
                .with(1, digital_out(peripherals.GPIO1))
                .with(2, digital_out(peripherals.GPIO2))
                .with(3, digital_out(peripherals.GPIO3))
                .with(4, pwm_out(ledc, pwm_timer, channel::Number::Channel0, peripherals.GPIO4))
                .with(5, pwm_out(ledc, pwm_timer, channel::Number::Channel1, peripherals.GPIO5))
                .with(6, digital_in(peripherals.GPIO6))
                .with(7, digital_in(peripherals.GPIO7));

            let store = FlashStore::new(FlashStorage::new(peripherals.FLASH), MAP_STORE_OFFSET);
            let beacon = LedBeacon::new(led_channel.sender());
            let node = NodeDispatcher::new(NODE_ID, node_ports(), pins, store, beacon);
            let link = WirelessLink::new(NODE_ID, radio, EmbassyClock);

            // Onboard RGB LED als Beacon
            spawner
                .spawn(led_task(
                    peripherals.GPIO8.into(),
                    peripherals.RMT,
                    1,
                    led_channel.receiver(),
                ))
                .unwrap();
            spawner.spawn(node_task(node, link)).unwrap();
            info!("Node {}: tasks started", NODE_ID.get());
        }
        Role::Tester => {
            // Pins passend zu config::ONBOARD
            let pins = GpioPins::new()
                .with(0, digital_out(peripherals.GPIO0))
                .with(1, digital_out(peripherals.GPIO1))
                .with(4, pwm_out(ledc, pwm_timer, channel::Number::Channel0, peripherals.GPIO4))
                .with(5, pwm_out(ledc, pwm_timer, channel::Number::Channel1, peripherals.GPIO5))
                .with(10, pwm_out(ledc, pwm_timer, channel::Number::Channel2, peripherals.GPIO10));

            let pixels = LedPixels::new(led_channel.sender());
            let processor = OutputProcessor::new(ONBOARD, pins, pixels);
            // Der Tester sendet CMD_RUN als Gateway
            let link = WirelessLink::new(NodeId::GATEWAY, radio, EmbassyClock);

            let uart = Uart::new(
                peripherals.UART1,
                UartConfig::default().with_baudrate(IPC_BAUDRATE),
            )
            .expect("Failed to initialize UART1")
            .with_rx(peripherals.GPIO23)
            .with_tx(peripherals.GPIO22)
            .into_async();

            // Pixel-Strip
            spawner
                .spawn(led_task(
                    peripherals.GPIO18.into(),
                    peripherals.RMT,
                    PIXEL_MAX_LEN,
                    led_channel.receiver(),
                ))
                .unwrap();
            spawner.spawn(tester_task(processor, uart, link)).unwrap();
            info!("Tester: tasks started");
        }
    }

    // Main-Loop: schläft, hält den WiFi-Controller am Leben
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}
