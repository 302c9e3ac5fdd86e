/// Raw bulk transport for panels that take full frames over a bulk OUT endpoint.
use std::time::Duration;

use rusb::{DeviceHandle, Direction, GlobalContext, TransferType};
use tracing::{debug, info, warn};

use crate::device::registry::DeviceDescriptor;
use crate::device::{DeviceError, Transport};

/// Vendor-specific interface class
const VENDOR_CLASS: u8 = 0xFF;
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
const ZLP_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BulkEndpoint {
    interface: u8,
    setting: u8,
    address: u8,
}

pub struct BulkTransport {
    descriptor: DeviceDescriptor,
    handle: DeviceHandle<GlobalContext>,
    endpoint: BulkEndpoint,
    claimed: bool,
}

impl BulkTransport {
    pub fn open(desc: &DeviceDescriptor) -> Result<Self, DeviceError> {
        let handle = rusb::open_device_with_vid_pid(desc.vendor_id, desc.product_id)
            .ok_or(DeviceError::NotFound)?;

        let endpoint = find_bulk_out(&handle.device())?
            .ok_or(DeviceError::NoBulkEndpoint(desc.vendor_id, desc.product_id))?;
        debug!(
            "Bulk OUT endpoint 0x{:02x} on interface {} alt {}",
            endpoint.address, endpoint.interface, endpoint.setting
        );

        match handle.kernel_driver_active(endpoint.interface) {
            Ok(true) => {
                if let Err(e) = handle.detach_kernel_driver(endpoint.interface) {
                    debug!("Kernel driver detach failed: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => debug!("Kernel driver query unsupported: {}", e),
        }

        handle.claim_interface(endpoint.interface)?;
        if endpoint.setting != 0 {
            handle.set_alternate_setting(endpoint.interface, endpoint.setting)?;
        }
        info!("Claimed interface {} on {}", endpoint.interface, desc.name);

        Ok(Self {
            descriptor: *desc,
            handle,
            endpoint,
            claimed: true,
        })
    }
}

/// Prefer a bulk OUT endpoint on a vendor-class interface, else the first
/// bulk OUT anywhere in the active configuration.
fn find_bulk_out(device: &rusb::Device<GlobalContext>) -> Result<Option<BulkEndpoint>, DeviceError> {
    let config = device.active_config_descriptor()?;
    let mut fallback = None;

    for interface in config.interfaces() {
        for setting in interface.descriptors() {
            for ep in setting.endpoint_descriptors() {
                if ep.direction() != Direction::Out || ep.transfer_type() != TransferType::Bulk {
                    continue;
                }
                let found = BulkEndpoint {
                    interface: setting.interface_number(),
                    setting: setting.setting_number(),
                    address: ep.address(),
                };
                if setting.class_code() == VENDOR_CLASS {
                    return Ok(Some(found));
                }
                fallback.get_or_insert(found);
            }
        }
    }
    Ok(fallback)
}

impl Transport for BulkTransport {
    fn send_packet(&mut self, data: &[u8]) -> Result<(), DeviceError> {
        let timeout = if data.is_empty() { ZLP_TIMEOUT } else { WRITE_TIMEOUT };
        let written = self.handle.write_bulk(self.endpoint.address, data, timeout)?;
        if written != data.len() {
            return Err(DeviceError::ShortWrite {
                written,
                expected: data.len(),
            });
        }
        Ok(())
    }

    fn reset(&mut self) -> Result<(), DeviceError> {
        debug!("Bus reset on {}", self.descriptor.name);
        match self.handle.reset() {
            Ok(()) => Ok(()),
            // re-enumerated: the old handle is gone, claim again; the
            // caller waits the settle interval
            Err(rusb::Error::NotFound) => {
                info!("{} re-enumerated after reset, reopening", self.descriptor.name);
                let fresh = Self::open(&self.descriptor)?;
                let mut stale = std::mem::replace(self, fresh);
                stale.claimed = false;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn release(&mut self) {
        if !self.claimed {
            return;
        }
        self.claimed = false;
        if let Err(e) = self.handle.release_interface(self.endpoint.interface) {
            warn!("Failed to release interface {}: {}", self.endpoint.interface, e);
        }
    }
}

impl Drop for BulkTransport {
    fn drop(&mut self) {
        self.release();
    }
}
