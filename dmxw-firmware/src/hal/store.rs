// Kanal-Zuordnungen im Flash
//
// Das Abbild liegt an einem festen Offset. Gelöschter Flash (alles 0xFF)
// bedeutet: noch nie gespeichert.

use defmt::{Debug2Format, error};
use dmxw_core::mapping::{MAP_IMAGE_LEN, MapImage};
use dmxw_core::traits::{MappingStore, StoreError};
use embedded_storage::{ReadStorage, Storage};
use esp_storage::FlashStorage;

pub struct FlashStore<'d> {
    flash: FlashStorage<'d>,
    offset: u32,
}

impl<'d> FlashStore<'d> {
    pub fn new(flash: FlashStorage<'d>, offset: u32) -> Self {
        Self { flash, offset }
    }
}

impl MappingStore for FlashStore<'_> {
    fn save(&mut self, image: &MapImage) -> Result<(), StoreError> {
        self.flash
            .write(self.offset, image.as_bytes())
            .map_err(|e| {
                error!("store: flash write failed: {}", Debug2Format(&e));
                StoreError::Io
            })
    }

    fn load(&mut self) -> Result<Option<MapImage>, StoreError> {
        let mut bytes = [0u8; MAP_IMAGE_LEN];
        self.flash.read(self.offset, &mut bytes).map_err(|e| {
            error!("store: flash read failed: {}", Debug2Format(&e));
            StoreError::Io
        })?;

        if bytes.iter().all(|&b| b == 0xFF) {
            return Ok(None);
        }
        MapImage::from_bytes(&bytes).map(Some)
    }
}
