/// Byte-layout logic for the panel protocols.
/// Everything here is pure: frames in, bytes out. Field order, widths and
/// endianness are fixed by the hardware and must not change.
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use image::RgbImage;

/// Bulk protocol header size
pub const BULK_HEADER_LEN: usize = 64;
/// Bulk protocol magic
pub const BULK_MAGIC: [u8; 4] = [0x12, 0x34, 0x56, 0x78];
/// Magic prefix of the framed report header
pub const FRAMED_MAGIC: [u8; 4] = [0xDA, 0xDB, 0xDC, 0xDD];

const BULK_CMD_OFFSET: usize = 0x04;
const BULK_WIDTH_OFFSET: usize = 0x08;
const BULK_HEIGHT_OFFSET: usize = 0x0C;
const BULK_MODE_OFFSET: usize = 0x38;
const BULK_LEN_OFFSET: usize = 0x3C;

/// Pack an RGB triple into RGB565
#[inline]
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Report-protocol pixel stream: column by column, each column walked
/// bottom-to-top, RGB565 little-endian. The last slot of every column
/// (the top row) is sent as a zero word.
pub fn encode_columns_le(frame: &RgbImage) -> Vec<u8> {
    let (width, height) = frame.dimensions();
    let mut out = vec![0u8; (width * height * 2) as usize];
    let mut offset = 0;

    for x in 0..width {
        for y in (0..height).rev() {
            if y != 0 {
                let p = frame.get_pixel(x, y);
                LittleEndian::write_u16(&mut out[offset..offset + 2], rgb565(p[0], p[1], p[2]));
            }
            offset += 2;
        }
    }
    out
}

/// Bulk-protocol pixel stream: row-major, top row first, RGB565 big-endian.
pub fn encode_rows_be(frame: &RgbImage) -> Vec<u8> {
    let mut out = vec![0u8; frame.as_raw().len() / 3 * 2];
    for (i, p) in frame.pixels().enumerate() {
        BigEndian::write_u16(&mut out[i * 2..i * 2 + 2], rgb565(p[0], p[1], p[2]));
    }
    out
}

/// `u8 0x69, u8 0x88, u16 width, u16 height, u16 0`, little-endian.
pub fn compact_header(width: u16, height: u16) -> Vec<u8> {
    let mut hdr = vec![0u8; 8];
    hdr[0] = 0x69;
    hdr[1] = 0x88;
    LittleEndian::write_u16(&mut hdr[2..4], width);
    LittleEndian::write_u16(&mut hdr[4..6], height);
    LittleEndian::write_u16(&mut hdr[6..8], 0);
    hdr
}

/// Magic `DA DB DC DD` followed by
/// `u16 2, u16 1, u16 width, u16 height, u16 2, u16 0, u32 payload_len, u16 0`,
/// little-endian.
pub fn framed_header(width: u16, height: u16) -> Vec<u8> {
    let payload_len = width as u32 * height as u32 * 2;
    let mut hdr = vec![0u8; 22];
    hdr[0..4].copy_from_slice(&FRAMED_MAGIC);
    LittleEndian::write_u16_into(&[2, 1, width, height, 2, 0], &mut hdr[4..16]);
    LittleEndian::write_u32(&mut hdr[16..20], payload_len);
    LittleEndian::write_u16(&mut hdr[20..22], 0);
    hdr
}

/// 64-byte bulk header. A `payload_len` of 0 marks end-of-stream.
pub fn bulk_header(cmd: u32, width: u32, height: u32, mode: u32, payload_len: u32) -> [u8; BULK_HEADER_LEN] {
    let mut hdr = [0u8; BULK_HEADER_LEN];
    hdr[0..4].copy_from_slice(&BULK_MAGIC);
    LittleEndian::write_u32(&mut hdr[BULK_CMD_OFFSET..BULK_CMD_OFFSET + 4], cmd);
    LittleEndian::write_u32(&mut hdr[BULK_WIDTH_OFFSET..BULK_WIDTH_OFFSET + 4], width);
    LittleEndian::write_u32(&mut hdr[BULK_HEIGHT_OFFSET..BULK_HEIGHT_OFFSET + 4], height);
    LittleEndian::write_u32(&mut hdr[BULK_MODE_OFFSET..BULK_MODE_OFFSET + 4], mode);
    LittleEndian::write_u32(&mut hdr[BULK_LEN_OFFSET..BULK_LEN_OFFSET + 4], payload_len);
    hdr
}

/// Split a payload into fixed-size reports, zero-padding the last one,
/// each prefixed with the report id.
pub fn chunk_reports(report_id: u8, payload: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
    payload
        .chunks(chunk_size)
        .map(|chunk| {
            let mut report = Vec::with_capacity(chunk_size + 1);
            report.push(report_id);
            report.extend_from_slice(chunk);
            report.resize(chunk_size + 1, 0);
            report
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// (0,0) red, (1,0) green, (0,1) blue, (1,1) white
    fn quad() -> RgbImage {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(0, 1, Rgb([0, 0, 255]));
        img.put_pixel(1, 1, Rgb([255, 255, 255]));
        img
    }

    #[test]
    fn test_rgb565_packing() {
        assert_eq!(rgb565(255, 0, 0), 0xF800);
        assert_eq!(rgb565(0, 255, 0), 0x07E0);
        assert_eq!(rgb565(0, 0, 255), 0x001F);
        assert_eq!(rgb565(255, 255, 255), 0xFFFF);
        assert_eq!(rgb565(7, 3, 7), 0x0000);
    }

    #[test]
    fn test_columns_le_golden() {
        // column 0 bottom-up: blue, then the zero word; column 1: white, zero word
        let bytes = encode_columns_le(&quad());
        assert_eq!(bytes, vec![0x1F, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0x00, 0x00]);
    }

    #[test]
    fn test_rows_be_golden() {
        let bytes = encode_rows_be(&quad());
        assert_eq!(bytes, vec![0xF8, 0x00, 0x07, 0xE0, 0x00, 0x1F, 0xFF, 0xFF]);
    }

    #[test]
    fn test_columns_le_bottom_first() {
        let mut img = RgbImage::new(1, 3);
        img.put_pixel(0, 1, Rgb([0, 0, 255]));
        img.put_pixel(0, 2, Rgb([255, 0, 0]));
        // y=2 (red) comes first, then y=1 (blue), then the top slot
        assert_eq!(encode_columns_le(&img), vec![0x00, 0xF8, 0x1F, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_compact_header() {
        assert_eq!(
            compact_header(480, 480),
            vec![0x69, 0x88, 0xE0, 0x01, 0xE0, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn test_framed_header() {
        let hdr = framed_header(320, 240);
        assert_eq!(hdr.len(), 22);
        assert_eq!(&hdr[0..4], &FRAMED_MAGIC);
        assert_eq!(&hdr[4..8], &[2, 0, 1, 0]);
        assert_eq!(&hdr[8..12], &[0x40, 0x01, 0xF0, 0x00]);
        assert_eq!(&hdr[12..16], &[2, 0, 0, 0]);
        assert_eq!(LittleEndian::read_u32(&hdr[16..20]), 153_600);
        assert_eq!(&hdr[20..22], &[0, 0]);
    }

    #[test]
    fn test_bulk_header_layout() {
        let hdr = bulk_header(3, 320, 320, 2, 204_800);
        assert_eq!(&hdr[0..4], &BULK_MAGIC);
        assert_eq!(&hdr[4..8], &[3, 0, 0, 0]);
        assert_eq!(LittleEndian::read_u32(&hdr[8..12]), 320);
        assert_eq!(LittleEndian::read_u32(&hdr[12..16]), 320);
        assert!(hdr[16..0x38].iter().all(|&b| b == 0));
        assert_eq!(LittleEndian::read_u32(&hdr[0x38..0x3C]), 2);
        assert_eq!(LittleEndian::read_u32(&hdr[0x3C..0x40]), 204_800);

        let eos = bulk_header(3, 320, 320, 2, 0);
        assert_eq!(&eos[0x3C..0x40], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_chunk_reports_pads_last() {
        let payload: Vec<u8> = (1..=10).collect();
        let reports = chunk_reports(0x00, &payload, 4);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0], vec![0, 1, 2, 3, 4]);
        assert_eq!(reports[1], vec![0, 5, 6, 7, 8]);
        assert_eq!(reports[2], vec![0, 9, 10, 0, 0]);
    }
}
