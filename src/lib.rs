#![doc = include_str!("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod error;
mod internal;
pub mod platform;

use crate::error::Error;
use crate::platform::{NoWriteProtect, Platform};
use embedded_hal::digital::OutputPin;

/// Datasheet write cycle time of the AT24LC family in microseconds. The chip
/// ignores all bus activity for up to this long after a write; acknowledge
/// polling may cut the wait short.
pub const WRITE_CYCLE_TIME_US: u64 = 5000;

/// Default payload bytes per bus transaction, excluding the two-byte word
/// address header. Matches the classic 32-byte Wire buffer.
pub const DEFAULT_TRANSFER_LIMIT: usize = 30;

/// Supported chip models. The discriminant is the capacity in bytes, so
/// `Model::from_repr(32768)` resolves a capacity back to its model.
#[derive(strum::FromRepr, strum::Display, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum Model {
    At24Lc32 = 4096,
    At24Lc64 = 8192,
    At24Lc128 = 16_384,
    At24Lc256 = 32_768,
    At24Lc512 = 65_536,
}

impl Model {
    /// Device capacity in bytes.
    pub const fn capacity(self) -> usize {
        self as u32 as usize
    }

    /// Internal write page size for this capacity class. A single write
    /// transaction must start and end within one page.
    pub const fn page_size(self) -> usize {
        let capacity = self as u32;
        if capacity <= 2048 {
            16
        } else if capacity <= 8192 {
            32
        } else if capacity <= 32_768 {
            64
        } else {
            128
        }
    }
}

/// Driver for one AT24LC chip at a fixed bus address.
///
/// `P` is the bus handle; pass `&mut bus` to keep ownership at the call site.
/// `MAX_TRANSFER` is the largest payload the transport moves in one
/// transaction (excluding the address header) and must be at least 1.
/// Operations take `&mut self` and run to completion on the calling context;
/// there is no internal locking.
pub struct Eeprom<P: Platform, WP: OutputPin = NoWriteProtect, const MAX_TRANSFER: usize = 30> {
    bus: P,
    address: u8,
    model: Model,
    last_write: u64,
    extra_twr_ms: u8,
    write_protect: Option<WP>,
}

impl<P: Platform> Eeprom<P> {
    /// Creates a driver without write-protect control, using the default
    /// transfer limit.
    pub fn new(bus: P, address: u8, model: Model) -> Self {
        Self::with_transfer_limit(bus, address, model, None)
    }
}

impl<P: Platform, WP: OutputPin> Eeprom<P, WP> {
    /// Creates a driver owning an active-high write-protect line. The line is
    /// asserted immediately and only released around write transactions.
    pub fn with_write_protect(bus: P, address: u8, model: Model, write_protect: WP) -> Self {
        Self::with_transfer_limit(bus, address, model, Some(write_protect))
    }
}

impl<P: Platform, WP: OutputPin, const MAX_TRANSFER: usize> Eeprom<P, WP, MAX_TRANSFER> {
    /// Fully explicit constructor for non-default transfer limits:
    /// `Eeprom::<_, NoWriteProtect, 128>::with_transfer_limit(...)`.
    pub fn with_transfer_limit(
        bus: P,
        address: u8,
        model: Model,
        write_protect: Option<WP>,
    ) -> Self {
        let mut eeprom = Self {
            bus,
            address,
            model,
            last_write: 0,
            extra_twr_ms: 0,
            write_protect,
        };
        if let Some(wp) = eeprom.write_protect.as_mut() {
            let _ = wp.set_high();
        }
        eeprom
    }

    /// Zero-length presence probe; true iff the chip acknowledged its address.
    pub fn is_connected(&mut self) -> bool {
        self.probe()
    }

    /// Reads `buf.len()` bytes starting at `addr` and returns how many bytes
    /// actually arrived. A transport failure mid-range stops the transfer and
    /// yields a short count rather than an error.
    pub fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<usize, Error> {
        self.check_range(addr, buf.len())?;
        Ok(self.read_chunked(addr as usize, buf))
    }

    /// Reads one byte.
    pub fn read_byte(&mut self, addr: u16) -> Result<u8, Error> {
        self.check_range(addr, 1)?;
        let mut value = [0u8; 1];
        if self.read_chunked(addr as usize, &mut value) != 1 {
            return Err(Error::Bus);
        }
        Ok(value[0])
    }

    /// Writes `data` starting at `addr`, splitting on page boundaries and the
    /// transfer limit, then verifies the full range by reading it back.
    /// `Ok(())` therefore means durably and correctly stored, not merely that
    /// every bus transaction was acknowledged.
    pub fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), Error> {
        self.check_range(addr, data.len())?;
        self.write_chunked(addr as usize, data.len(), data, true)?;
        self.confirm(addr as usize, data)
    }

    /// Writes one byte, with the same read-back verification as [`write`].
    ///
    /// [`write`]: Self::write
    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        self.write(addr, &[value])
    }

    /// Like [`write`], but reads each chunk first and skips the write when
    /// the stored content already matches, reducing wear and latency. The
    /// trailing verification still covers the full requested range.
    ///
    /// [`write`]: Self::write
    pub fn update(&mut self, addr: u16, data: &[u8]) -> Result<(), Error> {
        self.check_range(addr, data.len())?;
        let mut cursor = addr as usize;
        let mut rest = data;
        while !rest.is_empty() {
            let count = rest.len().min(MAX_TRANSFER);
            let mut current = [0u8; MAX_TRANSFER];
            // a failed or short read counts as different content
            let read = self.read_block(cursor, &mut current[..count]);
            if read != count || current[..count] != rest[..count] {
                self.write_chunked(cursor, count, &rest[..count], true)?;
            }
            cursor += count;
            rest = &rest[count..];
        }
        self.confirm(addr as usize, data)
    }

    /// Single-byte [`update`].
    ///
    /// [`update`]: Self::update
    pub fn update_byte(&mut self, addr: u16, value: u8) -> Result<(), Error> {
        self.check_range(addr, 1)?;
        let mut current = [0u8; 1];
        if self.read_block(addr as usize, &mut current) == 1 && current[0] == value {
            return Ok(());
        }
        self.write(addr, &[value])
    }

    /// Writes `fill` to every address of the device, re-sending one fill
    /// buffer in non-incrementing chunking mode. Not verified; run a full
    /// [`verify`] afterwards if required.
    ///
    /// [`verify`]: Self::verify
    pub fn format(&mut self, fill: u8) -> Result<(), Error> {
        let pattern = [fill; MAX_TRANSFER];
        self.write_chunked(0, self.model.capacity(), &pattern, false)
    }

    /// Compares the stored content of `[addr, addr + expected.len())` against
    /// `expected`, short-circuiting on the first mismatching chunk.
    pub fn verify(&mut self, addr: u16, expected: &[u8]) -> Result<bool, Error> {
        self.check_range(addr, expected.len())?;
        self.verify_chunked(addr as usize, expected)
    }

    /// Device capacity in bytes.
    pub fn size(&self) -> usize {
        self.model.capacity()
    }

    /// Internal write page size in bytes.
    pub fn page_size(&self) -> usize {
        self.model.page_size()
    }

    /// The chip model given at construction.
    pub fn model(&self) -> Model {
        self.model
    }

    /// The fixed 7-bit bus address given at construction.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Monotonic timestamp of the most recent write transaction, in
    /// microseconds; 0 when nothing has been written yet.
    pub fn last_write(&self) -> u64 {
        self.last_write
    }

    /// Extra write-cycle margin in milliseconds, added on top of
    /// [`WRITE_CYCLE_TIME_US`] for chips that need a longer quiet period.
    pub fn set_extra_write_cycle_time(&mut self, ms: u8) {
        self.extra_twr_ms = ms;
    }

    pub fn extra_write_cycle_time(&self) -> u8 {
        self.extra_twr_ms
    }

    /// Releases the bus handle and the write-protect line.
    pub fn free(self) -> (P, Option<WP>) {
        (self.bus, self.write_protect)
    }

    fn check_range(&self, addr: u16, len: usize) -> Result<(), Error> {
        if addr as usize + len > self.model.capacity() {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }
}
