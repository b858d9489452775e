//! checksums related functions module
//! This module is dedicated to internet checksums functions.
//!
//! credit for rfc1071, propagate_carries and one_complement_sum
//! calculation to ref. impl. <https://github.com/m-labs/smoltcp/blob/master/src/wire/ip.rs>
use byteorder::{ByteOrder, NetworkEndian};

use crate::packet::PseudoHeader;

const RFC1071_CHUNK_SIZE: usize = 32;

/// Unfolded one's complement sum of `data` taken as 16 bit network order words.
/// An odd trailing byte is the high half of a final zero padded word.
fn one_complement_sum(mut data: &[u8]) -> u32 {
    let mut acc = 0u32;

    // for each 32 bytes chunk
    while data.len() >= RFC1071_CHUNK_SIZE {
        let mut d = &data[..RFC1071_CHUNK_SIZE];
        while d.len() >= 2 {
            acc += NetworkEndian::read_u16(d) as u32;
            d = &d[2..];
        }
        // keep the accumulator away from overflow on large inputs
        acc = (acc >> 16) + (acc & 0xffff);
        data = &data[RFC1071_CHUNK_SIZE..];
    }

    while data.len() >= 2 {
        acc += NetworkEndian::read_u16(data) as u32;
        data = &data[2..];
    }

    if let Some(&v) = data.first() {
        acc += (v as u32) << 8;
    }
    acc
}

fn propagate_carries(mut word: u32) -> u16 {
    while word >> 16 != 0 {
        word = (word >> 16) + (word & 0xffff);
    }
    word as u16
}

fn sum_with_pseudo_header(pseudo: &PseudoHeader, data: &[u8]) -> u16 {
    let acc = one_complement_sum(&pseudo.to_bytes()) + one_complement_sum(data);
    propagate_carries(acc)
}

/// Checksum to embed in a packet. `data` must carry a zeroed checksum field.
pub fn calculate(pseudo: &PseudoHeader, data: &[u8]) -> u16 {
    !sum_with_pseudo_header(pseudo, data)
}

/// Validates a packet exactly as it was received, checksum field included.
/// The sum of a correct packet folds to all-ones.
pub fn confirm(pseudo: &PseudoHeader, data: &[u8]) -> bool {
    sum_with_pseudo_header(pseudo, data) == 0xffff
}
