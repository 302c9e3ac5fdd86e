/// Frame packetization per protocol family.
/// Turns a rendered frame into the exact sequence of transport writes.
use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::device::codec;
use crate::device::registry::{DeviceDescriptor, HeaderLayout, ProtocolKind};

const REPORT_ID: u8 = 0x00;
const BULK_CMD_FRAME: u32 = 3;
const BULK_MODE: u32 = 2;

#[derive(Debug, Clone)]
pub enum Protocol {
    Report {
        report_id: u8,
        chunk_size: usize,
        header: Vec<u8>,
    },
    Bulk {
        width: u32,
        height: u32,
        packet_size: usize,
        frame_header: [u8; codec::BULK_HEADER_LEN],
        eos_header: [u8; codec::BULK_HEADER_LEN],
    },
}

impl Protocol {
    /// Build the protocol for a panel; headers are computed once here.
    pub fn for_device(desc: &DeviceDescriptor) -> Self {
        match desc.protocol {
            ProtocolKind::Report(layout) => {
                let (w, h) = (desc.width as u16, desc.height as u16);
                let header = match layout {
                    HeaderLayout::Compact => codec::compact_header(w, h),
                    HeaderLayout::Framed => codec::framed_header(w, h),
                };
                Protocol::Report {
                    report_id: REPORT_ID,
                    chunk_size: desc.chunk_size,
                    header,
                }
            }
            ProtocolKind::Bulk => {
                let payload_len = desc.width * desc.height * 2;
                Protocol::Bulk {
                    width: desc.width,
                    height: desc.height,
                    packet_size: desc.chunk_size,
                    frame_header: codec::bulk_header(
                        BULK_CMD_FRAME,
                        desc.width,
                        desc.height,
                        BULK_MODE,
                        payload_len,
                    ),
                    eos_header: codec::bulk_header(BULK_CMD_FRAME, desc.width, desc.height, BULK_MODE, 0),
                }
            }
        }
    }

    pub fn header(&self) -> &[u8] {
        match self {
            Protocol::Report { header, .. } => header,
            Protocol::Bulk { frame_header, .. } => frame_header,
        }
    }

    pub fn encode_pixels(&self, frame: &RgbImage) -> Vec<u8> {
        match self {
            Protocol::Report { .. } => codec::encode_columns_le(frame),
            Protocol::Bulk { width, height, .. } => {
                if frame.dimensions() != (*width, *height) {
                    let resized = imageops::resize(frame, *width, *height, FilterType::Lanczos3);
                    codec::encode_rows_be(&resized)
                } else {
                    codec::encode_rows_be(frame)
                }
            }
        }
    }

    /// Every write for one frame, in order. For bulk panels the final
    /// entry is the empty commit packet.
    pub fn frame_packets(&self, frame: &RgbImage) -> Vec<Vec<u8>> {
        match self {
            Protocol::Report {
                report_id,
                chunk_size,
                header,
            } => {
                let mut payload = header.clone();
                payload.extend(self.encode_pixels(frame));
                codec::chunk_reports(*report_id, &payload, *chunk_size)
            }
            Protocol::Bulk {
                packet_size,
                frame_header,
                ..
            } => {
                let pixels = self.encode_pixels(frame);
                let mut packets = Vec::with_capacity(pixels.len() / packet_size + 2);
                packets.push(frame_header.to_vec());
                packets.extend(pixels.chunks(*packet_size).map(<[u8]>::to_vec));
                packets.push(Vec::new());
                packets
            }
        }
    }

    /// Writes that end a session, if the protocol defines any.
    pub fn shutdown_packets(&self) -> Vec<Vec<u8>> {
        match self {
            Protocol::Report { .. } => Vec::new(),
            Protocol::Bulk { eos_header, .. } => vec![eos_header.to_vec(), Vec::new()],
        }
    }
}
