// Hardware Abstraction Layer (HAL) Module
//
// Implementiert die Kollaborateur-Traits aus dmxw-core für ESP32-C6
// Hardware (ESP-NOW, GPIO/LEDC, Flash, RMT).

pub mod clock;
pub mod indicator;
pub mod led_writer;
pub mod pins;
pub mod radio;
pub mod store;

pub use clock::EmbassyClock;
pub use indicator::{LedBeacon, LedPixels};
pub use led_writer::{LedBuffer, LedError, RmtLedWriter, SmartLedWriter};
pub use pins::{GpioPins, PinDriver};
pub use radio::EspNowRadio;
pub use store::FlashStore;
