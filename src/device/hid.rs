/// HID transport for report-protocol panels.
use hidapi::{HidApi, HidDevice};
use tracing::{debug, info};

use crate::device::registry::DeviceDescriptor;
use crate::device::{bus_reset, DeviceError, Transport};

pub struct HidTransport {
    device: HidDevice,
    vendor_id: u16,
    product_id: u16,
}

impl HidTransport {
    pub fn open(desc: &DeviceDescriptor) -> Result<Self, DeviceError> {
        let api = HidApi::new()?;
        let device = api.open(desc.vendor_id, desc.product_id)?;
        info!("HID interface opened for {}", desc.name);
        Ok(Self {
            device,
            vendor_id: desc.vendor_id,
            product_id: desc.product_id,
        })
    }
}

impl Transport for HidTransport {
    fn send_packet(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        if data.is_empty() {
            return Ok(());
        }
        let written = self.device.write(data)?;
        if written < data.len() {
            return Err(DeviceError::ShortWrite {
                written,
                expected: data.len(),
            });
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        debug!("Bus reset {:04x}:{:04x}", self.vendor_id, self.product_id);
        bus_reset(self.vendor_id, self.product_id)
    }
}
