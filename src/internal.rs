use crate::error::Error;
use crate::platform::Platform;
use crate::{Eeprom, WRITE_CYCLE_TIME_US};
#[cfg(feature = "defmt")]
use defmt::{error, warn};
use embedded_hal::digital::OutputPin;
#[cfg(feature = "defmt")]
use embedded_hal::i2c::Error as _;
use embedded_hal::i2c::Operation;

impl<P: Platform, WP: OutputPin, const MAX_TRANSFER: usize> Eeprom<P, WP, MAX_TRANSFER> {
    /// Zero-length addressing transaction; true iff the chip acknowledged.
    pub(crate) fn probe(&mut self) -> bool {
        self.bus.write(self.address, &[]).is_ok()
    }

    /// Blocks until the write-cycle quiet period has elapsed or the chip
    /// answers a presence probe, whichever comes first. The probe doubles as
    /// a liveness check: a chip that finishes early is used early, a chip
    /// that overruns the datasheet time keeps the bus quiet until it answers.
    fn await_ready(&mut self) {
        let quiet = WRITE_CYCLE_TIME_US + u64::from(self.extra_twr_ms) * 1000;
        while P::now_micros().wrapping_sub(self.last_write) <= quiet {
            if self.probe() {
                return;
            }
            P::yield_now();
        }
    }

    /// One bus-legal, page-legal write: word address header and payload in a
    /// single frame, write-protect released for exactly this transaction.
    /// Caller guarantees `bytes.len() <= MAX_TRANSFER` and no page crossing.
    pub(crate) fn write_block(&mut self, addr: usize, bytes: &[u8]) -> Result<(), Error> {
        debug_assert!(bytes.len() <= MAX_TRANSFER);
        self.await_ready();

        let header = (addr as u16).to_be_bytes();
        if let Some(wp) = self.write_protect.as_mut() {
            let _ = wp.set_low();
        }
        let result = self.bus.transaction(
            self.address,
            &mut [Operation::Write(&header), Operation::Write(bytes)],
        );
        if let Some(wp) = self.write_protect.as_mut() {
            let _ = wp.set_high();
        }
        // the chip may have latched the page and started its cycle even when
        // the transaction ended in an error
        self.last_write = P::now_micros();
        P::yield_now();

        match result {
            Ok(()) => Ok(()),
            Err(_e) => {
                #[cfg(feature = "defmt")]
                error!(
                    "i2c write failed: dev {:#04x} addr {:#06x} {}",
                    self.address,
                    addr as u16,
                    _e.kind()
                );
                Err(Error::Bus)
            }
        }
    }

    /// One bus-legal read: address phase, repeated start, data phase.
    /// Returns the bytes actually received; a transport failure is logged and
    /// degrades to 0 rather than a hard fault.
    pub(crate) fn read_block(&mut self, addr: usize, buf: &mut [u8]) -> usize {
        debug_assert!(buf.len() <= MAX_TRANSFER);
        self.await_ready();

        let header = (addr as u16).to_be_bytes();
        let result = self.bus.write_read(self.address, &header, buf);
        P::yield_now();

        match result {
            Ok(()) => buf.len(),
            Err(_e) => {
                #[cfg(feature = "defmt")]
                {
                    error!(
                        "i2c read failed: dev {:#04x} addr {:#06x} {}",
                        self.address,
                        addr as u16,
                        _e.kind()
                    );
                    warn!(
                        "short read: addr {:#06x} requested {} received {}",
                        addr as u16,
                        buf.len(),
                        0
                    );
                }
                0
            }
        }
    }

    /// Reads one block and compares it against `expected`. `Ok(false)` is a
    /// content mismatch; a failed read is a transport error, not a mismatch.
    pub(crate) fn verify_block(&mut self, addr: usize, expected: &[u8]) -> Result<bool, Error> {
        debug_assert!(expected.len() <= MAX_TRANSFER);
        self.await_ready();

        let header = (addr as u16).to_be_bytes();
        let mut current = [0u8; MAX_TRANSFER];
        let result = self
            .bus
            .write_read(self.address, &header, &mut current[..expected.len()]);
        P::yield_now();

        match result {
            Ok(()) => Ok(current[..expected.len()] == *expected),
            Err(_e) => {
                #[cfg(feature = "defmt")]
                error!(
                    "i2c verify read failed: dev {:#04x} addr {:#06x} {}",
                    self.address,
                    addr as u16,
                    _e.kind()
                );
                Err(Error::Bus)
            }
        }
    }

    /// Splits `[addr, addr + len)` into write transactions bounded by the
    /// transfer limit and the page boundary. With `advance` unset the same
    /// `buf` prefix is re-sent for every chunk (chip-fill mode); `buf` must
    /// then hold at least `MAX_TRANSFER` bytes.
    pub(crate) fn write_chunked(
        &mut self,
        addr: usize,
        len: usize,
        buf: &[u8],
        advance: bool,
    ) -> Result<(), Error> {
        let page = self.model.page_size();
        let mut cursor = addr;
        let mut remaining = len;
        let mut offset = 0;
        while remaining > 0 {
            let until_boundary = page - cursor % page;
            let count = MAX_TRANSFER.min(remaining).min(until_boundary);
            self.write_block(cursor, &buf[offset..offset + count])?;
            cursor += count;
            remaining -= count;
            if advance {
                offset += count;
            }
        }
        Ok(())
    }

    /// Fills `buf` from `[addr, ...)` in transfer-limit chunks. Returns the
    /// byte count actually read; a failed block ends the transfer early.
    pub(crate) fn read_chunked(&mut self, addr: usize, buf: &mut [u8]) -> usize {
        let mut cursor = addr;
        let mut received = 0;
        for chunk in buf.chunks_mut(MAX_TRANSFER) {
            let read = self.read_block(cursor, chunk);
            received += read;
            if read != chunk.len() {
                break;
            }
            cursor += chunk.len();
        }
        received
    }

    /// Compares `[addr, addr + expected.len())` against `expected` in
    /// transfer-limit chunks, short-circuiting on the first mismatch.
    pub(crate) fn verify_chunked(&mut self, addr: usize, expected: &[u8]) -> Result<bool, Error> {
        let mut cursor = addr;
        for chunk in expected.chunks(MAX_TRANSFER) {
            if !self.verify_block(cursor, chunk)? {
                return Ok(false);
            }
            cursor += chunk.len();
        }
        Ok(true)
    }

    /// Read-back pass for the write and update paths.
    pub(crate) fn confirm(&mut self, addr: usize, expected: &[u8]) -> Result<(), Error> {
        if self.verify_chunked(addr, expected)? {
            Ok(())
        } else {
            Err(Error::Verify)
        }
    }
}
