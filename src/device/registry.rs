/// Static table of supported panels, keyed by USB vendor/product id.
use std::time::Duration;
use tracing::debug;

use crate::device::DeviceError;

/// Header layout used by a report-protocol panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLayout {
    /// `u8,u8,u16,u16,u16`
    Compact,
    /// 4-byte magic + packed fields
    Framed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// Fixed-size HID reports
    Report(HeaderLayout),
    /// Raw bulk transfers with a 64-byte header and ZLP commit
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub chunk_size: usize,
    pub protocol: ProtocolKind,
    /// Quiet time after claiming before the first frame
    pub settle: Duration,
    /// Quiet time after the end-of-stream sequence
    pub quiet: Duration,
}

impl DeviceDescriptor {
    /// Theme file name for this panel's native resolution, e.g. `config_320240.yaml`
    pub fn config_file_name(&self) -> String {
        format!("config_{}{}.yaml", self.width, self.height)
    }
}

pub const SUPPORTED_DEVICES: &[DeviceDescriptor] = &[
    DeviceDescriptor {
        vendor_id: 0x0418,
        product_id: 0x5304,
        name: "HID 480x480",
        width: 480,
        height: 480,
        chunk_size: 512,
        protocol: ProtocolKind::Report(HeaderLayout::Compact),
        settle: Duration::ZERO,
        quiet: Duration::ZERO,
    },
    DeviceDescriptor {
        vendor_id: 0x0416,
        product_id: 0x5302,
        name: "Winbond HID 320x240",
        width: 320,
        height: 240,
        chunk_size: 512,
        protocol: ProtocolKind::Report(HeaderLayout::Framed),
        settle: Duration::ZERO,
        quiet: Duration::ZERO,
    },
    DeviceDescriptor {
        vendor_id: 0x87AD,
        product_id: 0x70DB,
        name: "ChiZhu USBDISPLAY 320x320",
        width: 320,
        height: 320,
        chunk_size: 512,
        protocol: ProtocolKind::Bulk,
        settle: Duration::from_secs(2),
        quiet: Duration::from_secs(2),
    },
];

pub fn lookup(vendor_id: u16, product_id: u16) -> Option<&'static DeviceDescriptor> {
    SUPPORTED_DEVICES
        .iter()
        .find(|d| d.vendor_id == vendor_id && d.product_id == product_id)
}

/// Scan the bus and return the first connected panel, in registry order.
pub fn find_connected() -> Result<Option<&'static DeviceDescriptor>, DeviceError> {
    let mut present = Vec::new();
    for device in rusb::devices()?.iter() {
        match device.device_descriptor() {
            Ok(desc) => present.push((desc.vendor_id(), desc.product_id())),
            Err(e) => debug!("Skipping unreadable USB device: {}", e),
        }
    }
    Ok(match_first(&present))
}

fn match_first(present: &[(u16, u16)]) -> Option<&'static DeviceDescriptor> {
    SUPPORTED_DEVICES
        .iter()
        .find(|d| present.contains(&(d.vendor_id, d.product_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let d = lookup(0x87AD, 0x70DB).unwrap();
        assert_eq!((d.width, d.height), (320, 320));
        assert_eq!(d.protocol, ProtocolKind::Bulk);
        assert!(lookup(0x1234, 0x5678).is_none());
    }

    #[test]
    fn test_match_first_follows_registry_order() {
        let present = [(0x87AD, 0x70DB), (0x0416, 0x5302)];
        let d = match_first(&present).unwrap();
        assert_eq!(d.product_id, 0x5302);
        assert!(match_first(&[(0xFFFF, 0x0001)]).is_none());
    }

    #[test]
    fn test_config_file_name() {
        let d = lookup(0x0416, 0x5302).unwrap();
        assert_eq!(d.config_file_name(), "config_320240.yaml");
    }
}
