//! Decoding of the EDID base block a display reports about itself.
//!
//! Only the first 128 bytes are interpreted. Extension blocks are accepted so
//! that full EDID dumps can be passed in unchanged, but their content is left
//! alone.

use thiserror::Error;

const BLOCK_SIZE: usize = 128;
const HEADER: [u8; 8] = [0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x00];
const DESCRIPTOR_OFFSETS: [usize; 4] = [54, 72, 90, 108];
const DESCRIPTOR_SIZE: usize = 18;

const TAG_SERIAL_NUMBER: u8 = 0xff;
const TAG_UNSPECIFIED_TEXT: u8 = 0xfe;
const TAG_RANGE_LIMITS: u8 = 0xfd;
const TAG_MONITOR_NAME: u8 = 0xfc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum EdidError {
    #[error("EDID length {0} is not a positive multiple of 128")]
    InvalidLength(usize),
    #[error("Invalid EDID header")]
    InvalidHeader,
    #[error("Invalid EDID checksum")]
    InvalidChecksum,
}

/// One of the four 18-byte slots following the standard timings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Descriptor {
    /// Detailed timing descriptors and display descriptors we do not interpret.
    Undefined,
    MonitorName(String),
    SerialNumberText(String),
    UnspecifiedText(String),
    /// Raw 13-byte payload, not interpreted.
    RangeLimits(Vec<u8>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PhysicalSize {
    pub(crate) width_cm: u8,
    pub(crate) height_cm: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdidVersion {
    pub(crate) version: u8,
    pub(crate) revision: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DisplayIdentity {
    pub(crate) vendor: String,
    pub(crate) product_code: u16,
    pub(crate) serial_number: u32,
    pub(crate) manufacture_week: u8,
    pub(crate) manufacture_year: u16,
    pub(crate) version: EdidVersion,
    /// Zero in either dimension means the display only reports an aspect ratio.
    pub(crate) physical_size: PhysicalSize,
    pub(crate) descriptors: [Descriptor; 4],
    pub(crate) extension_count: u8,
}

impl DisplayIdentity {
    pub(crate) fn monitor_name(&self) -> Option<&str> {
        self.descriptors.iter().find_map(|descriptor| match descriptor {
            Descriptor::MonitorName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub(crate) fn serial_text(&self) -> Option<&str> {
        self.descriptors.iter().find_map(|descriptor| match descriptor {
            Descriptor::SerialNumberText(serial) => Some(serial.as_str()),
            _ => None,
        })
    }

    /// Key identifying this physical display across connectors and restarts.
    pub(crate) fn display_id(&self) -> String {
        format!(
            "{}-{:04X}-{}",
            self.vendor, self.product_code, self.serial_number
        )
    }
}

pub(crate) fn decode(bytes: &[u8]) -> Result<DisplayIdentity, EdidError> {
    let block = match bytes.first_chunk::<BLOCK_SIZE>() {
        Some(block) if bytes.len() % BLOCK_SIZE == 0 => block,
        _ => return Err(EdidError::InvalidLength(bytes.len())),
    };

    // The header is checked first so that a block with a fixed-up checksum
    // still reports the header fault.
    if block[..HEADER.len()] != HEADER {
        return Err(EdidError::InvalidHeader);
    }
    if block_sum(block) != 0 {
        return Err(EdidError::InvalidChecksum);
    }

    Ok(DisplayIdentity {
        vendor: decode_vendor(u16::from_be_bytes([block[8], block[9]])),
        product_code: u16::from_le_bytes([block[10], block[11]]),
        serial_number: u32::from_le_bytes([block[12], block[13], block[14], block[15]]),
        manufacture_week: block[16],
        manufacture_year: 1990 + u16::from(block[17]),
        version: EdidVersion {
            version: block[18],
            revision: block[19],
        },
        physical_size: PhysicalSize {
            width_cm: block[21],
            height_cm: block[22],
        },
        descriptors: DESCRIPTOR_OFFSETS
            .map(|offset| decode_descriptor(&block[offset..offset + DESCRIPTOR_SIZE])),
        extension_count: block[126],
    })
}

fn block_sum(block: &[u8; BLOCK_SIZE]) -> u8 {
    block.iter().fold(0u8, |sum, &byte| sum.wrapping_add(byte))
}

fn decode_vendor(packed: u16) -> String {
    [10, 5, 0]
        .into_iter()
        .map(|shift| match (packed >> shift) & 0x1f {
            letter @ 1..=26 => char::from(b'A' + letter as u8 - 1),
            _ => '?',
        })
        .collect()
}

fn decode_descriptor(block: &[u8]) -> Descriptor {
    let [b0, b1, b2, tag, _, payload @ ..] = block else {
        return Descriptor::Undefined;
    };

    // A non-zero pixel clock marks a detailed timing descriptor.
    if [*b0, *b1, *b2] != [0, 0, 0] {
        return Descriptor::Undefined;
    }

    match *tag {
        TAG_MONITOR_NAME => Descriptor::MonitorName(decode_text(payload)),
        TAG_SERIAL_NUMBER => Descriptor::SerialNumberText(decode_text(payload)),
        TAG_UNSPECIFIED_TEXT => Descriptor::UnspecifiedText(decode_text(payload)),
        TAG_RANGE_LIMITS => Descriptor::RangeLimits(payload.to_vec()),
        _ => Descriptor::Undefined,
    }
}

fn decode_text(payload: &[u8]) -> String {
    let text = payload
        .split(|&byte| byte == b'\n')
        .next()
        .unwrap_or_default();
    String::from_utf8_lossy(text)
        .trim_end_matches([' ', '\0'])
        .to_string()
}
