#[cfg(test)]
mod chandata_test;

use super::channum::{ChannelNumber, MAX_CHANNEL_NUMBER, MIN_CHANNEL_NUMBER};
use crate::error::*;

const CHANNEL_DATA_HEADER_SIZE: usize = 4;
const CHANNEL_DATA_PADDING: usize = 4;

/// `ChannelData` is a framed, non-STUN message used to relay data between a
/// client and one of its peers once a channel has been bound.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Channel Number        |            Length            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                                                               |
/// /                       Application Data                       /
/// /                                                               /
/// |                                                               |
/// |                               +-------------------------------+
/// |                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// https://tools.ietf.org/html/rfc5766#section-11.4
#[derive(PartialEq, Eq, Debug, Default, Clone)]
pub struct ChannelData {
    pub data: Vec<u8>,
    pub number: ChannelNumber,
    pub raw: Vec<u8>,
}

impl ChannelData {
    /// Encodes `self.number`/`self.data` into `self.raw`, padding the
    /// payload to a 4-byte boundary per the framing above.
    pub fn encode(&mut self) {
        self.raw.clear();
        self.raw.reserve(CHANNEL_DATA_HEADER_SIZE + self.data.len());
        self.raw.extend_from_slice(&self.number.0.to_be_bytes());
        self.raw
            .extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        self.raw.extend_from_slice(&self.data);

        let padding = padding(self.data.len());
        self.raw.extend(std::iter::repeat(0u8).take(padding));
    }

    /// Parses `self.raw` into `self.number`/`self.data`, validating the
    /// declared length and channel-number range.
    pub fn decode(&mut self) -> Result<()> {
        if self.raw.len() < CHANNEL_DATA_HEADER_SIZE {
            return Err(Error::ErrUnexpectedEof);
        }

        let number = ChannelNumber(u16::from_be_bytes([self.raw[0], self.raw[1]]));
        number.is_valid()?;

        let length = u16::from_be_bytes([self.raw[2], self.raw[3]]) as usize;
        if self.raw.len() - CHANNEL_DATA_HEADER_SIZE < length {
            return Err(Error::ErrBadChannelDataLength);
        }

        self.number = number;
        self.data = self.raw[CHANNEL_DATA_HEADER_SIZE..CHANNEL_DATA_HEADER_SIZE + length].to_vec();

        Ok(())
    }
}

/// `is_channel_data` reports whether `buf` looks like a ChannelData frame
/// (as opposed to a STUN-formatted message) by checking that its first two
/// bits are set, which distinguishes it from STUN's leading `00` bits.
pub fn is_channel_data(buf: &[u8]) -> bool {
    buf.len() >= CHANNEL_DATA_HEADER_SIZE && {
        let number = u16::from_be_bytes([buf[0], buf[1]]);
        (MIN_CHANNEL_NUMBER..=MAX_CHANNEL_NUMBER).contains(&number)
    }
}

fn padding(len: usize) -> usize {
    let rem = len % CHANNEL_DATA_PADDING;
    if rem == 0 {
        0
    } else {
        CHANNEL_DATA_PADDING - rem
    }
}
