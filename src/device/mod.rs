/// Panel access: registry, wire codec, protocol framing and USB transports.
pub mod bulk;
pub mod codec;
pub mod hid;
pub mod protocol;
pub mod registry;

use std::thread;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use protocol::Protocol;
use registry::{DeviceDescriptor, ProtocolKind};

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no supported panel connected")]
    NotFound,

    #[error("usb: {0}")]
    Usb(#[from] rusb::Error),

    #[error("hid: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("no bulk OUT endpoint on {0:04x}:{1:04x}")]
    NoBulkEndpoint(u16, u16),

    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("device already shut down")]
    Closed,
}

/// A single write sink to the panel.
pub trait Transport: Send {
    /// Write one packet. An empty packet is a zero-length commit.
    fn send_packet(&mut self, data: &[u8]) -> Result<(), DeviceError>;

    /// Bus-level reset.
    fn reset(&mut self) -> Result<(), DeviceError>;

    /// Give the interface back to the system.
    fn release(&mut self) {}
}

/// An open panel session.
pub struct Device {
    descriptor: DeviceDescriptor,
    protocol: Protocol,
    transport: Box<dyn Transport>,
    closed: bool,
}

impl Device {
    /// Open the transport matching the panel's protocol family.
    pub fn open(descriptor: &DeviceDescriptor) -> Result<Self, DeviceError> {
        info!(
            "Opening {} ({:04x}:{:04x}) {}x{}",
            descriptor.name, descriptor.vendor_id, descriptor.product_id, descriptor.width, descriptor.height
        );

        let transport: Box<dyn Transport> = match descriptor.protocol {
            ProtocolKind::Report(_) => Box::new(hid::HidTransport::open(descriptor)?),
            ProtocolKind::Bulk => Box::new(bulk::BulkTransport::open(descriptor)?),
        };

        if !descriptor.settle.is_zero() {
            debug!("Waiting {:?} for panel to settle", descriptor.settle);
            thread::sleep(descriptor.settle);
        }

        Ok(Self::with_transport(descriptor, transport))
    }

    pub fn with_transport(descriptor: &DeviceDescriptor, transport: Box<dyn Transport>) -> Self {
        Self {
            descriptor: *descriptor,
            protocol: Protocol::for_device(descriptor),
            transport,
            closed: false,
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Bus reset. The panel may re-enumerate and be claimed again, so the
    /// settle interval applies afterwards as it does after `open`.
    pub fn reset(&mut self) -> Result<(), DeviceError> {
        info!("Resetting {}", self.descriptor.name);
        self.transport.reset()?;
        if !self.descriptor.settle.is_zero() {
            debug!("Waiting {:?} for panel to settle after reset", self.descriptor.settle);
            thread::sleep(self.descriptor.settle);
        }
        Ok(())
    }

    /// Encode and write one frame. Frames of the wrong size are scaled
    /// to the native resolution.
    pub fn send_frame(&mut self, frame: &RgbImage) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        for packet in self.protocol.frame_packets(frame) {
            self.transport.send_packet(&packet)?;
        }
        Ok(())
    }

    /// End the session: end-of-stream for bulk panels, then release.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let packets = self.protocol.shutdown_packets();
        if !packets.is_empty() {
            for packet in &packets {
                if let Err(e) = self.transport.send_packet(packet) {
                    warn!("End-of-stream write failed: {}", e);
                    break;
                }
            }
            if !self.descriptor.quiet.is_zero() {
                thread::sleep(self.descriptor.quiet);
            }
        }

        self.transport.release();
        info!("{} released", self.descriptor.name);
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reset a device on the bus without opening it through hidapi.
pub(crate) fn bus_reset(vendor_id: u16, product_id: u16) -> Result<(), DeviceError> {
    let mut handle = rusb::open_device_with_vid_pid(vendor_id, product_id).ok_or(DeviceError::NotFound)?;
    match handle.reset() {
        Ok(()) | Err(rusb::Error::NotFound) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records every packet; optionally fails the first N writes.
    #[derive(Clone, Default)]
    pub struct RecordingTransport {
        pub packets: Arc<Mutex<Vec<Vec<u8>>>>,
        pub resets: Arc<Mutex<usize>>,
        pub released: Arc<Mutex<bool>>,
        pub fail_writes: Arc<Mutex<usize>>,
    }

    impl Transport for RecordingTransport {
        fn send_packet(&mut self, data: &[u8]) -> Result<(), DeviceError> {
            let mut fail = self.fail_writes.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(DeviceError::ShortWrite {
                    written: 0,
                    expected: data.len(),
                });
            }
            self.packets.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        fn reset(&mut self) -> Result<(), DeviceError> {
            *self.resets.lock().unwrap() += 1;
            Ok(())
        }

        fn release(&mut self) {
            *self.released.lock().unwrap() = true;
        }
    }

    /// Same panel without settle or quiet waits
    pub fn quick(desc: &DeviceDescriptor) -> DeviceDescriptor {
        DeviceDescriptor {
            settle: std::time::Duration::ZERO,
            quiet: std::time::Duration::ZERO,
            ..*desc
        }
    }

    #[test]
    fn test_bulk_shutdown_sends_eos_once() {
        let desc = quick(registry::lookup(0x87AD, 0x70DB).unwrap());
        let transport = RecordingTransport::default();
        let mut dev = Device::with_transport(&desc, Box::new(transport.clone()));

        dev.shutdown();
        dev.shutdown();
        drop(dev);

        let packets = transport.packets.lock().unwrap();
        assert_eq!(packets.len(), 2);
        assert_eq!(&packets[0][0..4], &codec::BULK_MAGIC);
        assert!(packets[1].is_empty());
        assert!(*transport.released.lock().unwrap());
    }

    #[test]
    fn test_send_after_shutdown_fails() {
        let desc = quick(registry::lookup(0x0418, 0x5304).unwrap());
        let mut dev = Device::with_transport(&desc, Box::new(RecordingTransport::default()));
        dev.shutdown();
        let frame = RgbImage::new(480, 480);
        assert!(matches!(dev.send_frame(&frame), Err(DeviceError::Closed)));
    }

    #[test]
    fn test_write_failure_surfaces() {
        let desc = quick(registry::lookup(0x0416, 0x5302).unwrap());
        let transport = RecordingTransport::default();
        *transport.fail_writes.lock().unwrap() = 1;
        let mut dev = Device::with_transport(&desc, Box::new(transport.clone()));

        let frame = RgbImage::new(320, 240);
        assert!(dev.send_frame(&frame).is_err());
        assert!(dev.send_frame(&frame).is_ok());
        assert_eq!(transport.packets.lock().unwrap().len(), (22 + 320 * 240 * 2usize).div_ceil(512));
    }

    #[test]
    fn test_reset_delegates() {
        let desc = quick(registry::lookup(0x0418, 0x5304).unwrap());
        let transport = RecordingTransport::default();
        let mut dev = Device::with_transport(&desc, Box::new(transport.clone()));
        dev.reset().unwrap();
        assert_eq!(*transport.resets.lock().unwrap(), 1);
    }

    #[test]
    fn test_reset_waits_settle() {
        let desc = DeviceDescriptor {
            settle: std::time::Duration::from_millis(40),
            ..quick(registry::lookup(0x87AD, 0x70DB).unwrap())
        };
        let transport = RecordingTransport::default();
        let mut dev = Device::with_transport(&desc, Box::new(transport.clone()));

        let started = std::time::Instant::now();
        dev.reset().unwrap();
        assert!(started.elapsed() >= desc.settle);
        assert_eq!(*transport.resets.lock().unwrap(), 1);
        dev.shutdown();
    }
}
