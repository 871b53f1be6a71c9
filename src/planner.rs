//! Transfer Planner (§4.4): decomposes an arbitrary `(address, length)`
//! request into a legal sequence of 8-bit and 32-bit primitive calls.
//!
//! The head-alignment chunk is sized to reach the next 4-byte boundary
//! (at most 3 bytes), not to the 8-bit primitive's full 64-byte capacity;
//! only that reading reproduces the worked examples and lets the body
//! loop pick up on an aligned address immediately afterwards. `fill_mem`
//! follows the same head rule as `write_mem`. The body loop and the
//! `length > A8` gate that decides whether a head split is worth doing at
//! all both still use the full 64-byte primitive limit.

use crate::error::Error;
use crate::primitives::{MAX_32BIT_TRANSFER, MAX_8BIT_TRANSFER};
use crate::session::Session;
use std::collections::VecDeque;

const A8: u32 = MAX_8BIT_TRANSFER as u32;
const A32: u32 = MAX_32BIT_TRANSFER as u32;

/// Bytes needed to bring `address` to the next 4-byte boundary, capped by
/// `length`. Zero if already aligned or if the whole request is short
/// enough to stay on the 8-bit path without splitting.
fn head_chunk_size(address: u32, length: u32) -> u32 {
    if address % 4 != 0 && length > A8 {
        length.min(4 - (address % 4))
    } else {
        0
    }
}

impl Session {
    /// `read_mem(addr, length) → lazy bytes`.
    ///
    /// Returns a pull-based iterator yielding one chunk (one primitive's
    /// worth of bytes) per item, so a caller can stream an arbitrarily
    /// large read without this crate ever buffering the whole thing.
    pub fn read_mem(&mut self, address: u32, length: u32) -> ReadMem<'_> {
        ReadMem {
            session: self,
            address,
            remaining: length,
            head_done: false,
        }
    }

    /// `write_mem(addr, data)`. Consumes `data` chunk by chunk, preferring
    /// 32-bit aligned writes and falling back to 8-bit for the unaligned
    /// head and any sub-4-byte tail.
    #[tracing::instrument(skip(self, data))]
    pub fn write_mem(&mut self, mut address: u32, data: impl IntoIterator<Item = u8>) -> Result<(), Error> {
        let mut data = data.into_iter();

        if address % 4 != 0 {
            let max = (4 - (address % 4)) as usize;
            let chunk: Vec<u8> = data.by_ref().take(max).collect();
            if chunk.is_empty() {
                return Ok(());
            }
            let chunk_len = chunk.len() as u32;
            self.write_mem8(address, &chunk)?;
            address += chunk_len;
        }

        loop {
            let chunk: Vec<u8> = data.by_ref().take(A32 as usize).collect();
            if chunk.is_empty() {
                return Ok(());
            }

            if chunk.len() % 4 == 0 {
                self.write_mem32(address, &chunk)?;
                address += chunk.len() as u32;
                continue;
            }

            if chunk.len() > MAX_8BIT_TRANSFER {
                let k = chunk.len() & !3;
                self.write_mem32(address, &chunk[..k])?;
                address += k as u32;
                self.write_mem8(address, &chunk[k..])?;
            } else {
                self.write_mem8(address, &chunk)?;
            }
            // The source returns here: a chunk shorter than A32 means the
            // data iterator is exhausted, so there is nothing left to plan.
            return Ok(());
        }
    }

    /// `fill_mem(addr, pattern, length)`. Bytes are generated from
    /// `pattern` on the fly rather than materialized into a buffer; the
    /// phase (`pattern[(offset) mod pattern.len()]`) is preserved across
    /// chunk and primitive boundaries.
    #[tracing::instrument(skip(self, pattern))]
    pub fn fill_mem(&mut self, mut address: u32, pattern: &[u8], length: u32) -> Result<(), Error> {
        if pattern.is_empty() || length == 0 {
            return Ok(());
        }

        let mut remaining = length;
        let mut phase: usize = 0;

        while remaining > 0 {
            let mut chunk_size = remaining;
            let use_8bit = address % 4 != 0 || (chunk_size < A8 && chunk_size % 4 != 0);

            let buf = if use_8bit {
                if chunk_size > A8 {
                    chunk_size = chunk_size.min(4 - (address % 4));
                }
                let buf = pattern_bytes(pattern, phase, chunk_size as usize);
                self.write_mem8(address, &buf)?;
                buf
            } else {
                chunk_size = chunk_size.min(A32);
                chunk_size -= chunk_size % 4;
                let buf = pattern_bytes(pattern, phase, chunk_size as usize);
                self.write_mem32(address, &buf)?;
                buf
            };

            phase = (phase + buf.len()) % pattern.len();
            address += chunk_size;
            remaining -= chunk_size;
        }

        Ok(())
    }
}

fn pattern_bytes(pattern: &[u8], phase: usize, len: usize) -> Vec<u8> {
    (0..len).map(|i| pattern[(phase + i) % pattern.len()]).collect()
}

/// Lazy byte-chunk iterator returned by [`Session::read_mem`].
pub struct ReadMem<'a> {
    session: &'a mut Session,
    address: u32,
    remaining: u32,
    head_done: bool,
}

impl<'a> Iterator for ReadMem<'a> {
    type Item = Result<Vec<u8>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let head = if !self.head_done {
            self.head_done = true;
            head_chunk_size(self.address, self.remaining)
        } else {
            0
        };

        let (is_8bit, chunk_size) = if head > 0 {
            (true, head)
        } else if self.remaining < A8 && self.remaining % 4 != 0 {
            (true, self.remaining)
        } else {
            let mut k = self.remaining.min(A32);
            k -= k % 4;
            (false, k)
        };

        let result = if is_8bit {
            self.session.read_mem8(self.address, chunk_size)
        } else {
            self.session.read_mem32(self.address, chunk_size)
        };

        match result {
            Ok(bytes) => {
                self.address += chunk_size;
                self.remaining -= chunk_size;
                Some(Ok(bytes))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }
}

/// Collects a [`ReadMem`] iterator into a single contiguous buffer.
/// Convenience for callers who don't need streaming.
pub fn collect_read(read: ReadMem<'_>) -> Result<Vec<u8>, Error> {
    let mut out = VecDeque::new();
    for chunk in read {
        out.extend(chunk?);
    }
    Ok(out.into())
}
