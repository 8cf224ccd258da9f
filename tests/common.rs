#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use at24lc::Model;
use at24lc::platform::Monotonic;
use embedded_hal::digital;
use embedded_hal::i2c::{
    self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress,
};
use std::cell::Cell;
use std::convert::Infallible;

pub const DEVICE_ADDRESS: u8 = 0x50;

/// Microseconds the simulated chip stays busy after a payload write.
pub const BUSY_WINDOW_US: u64 = 3500;
/// How far `yield_now` advances the fake clock per call.
pub const YIELD_STEP_US: u64 = 250;

thread_local! {
    static NOW: Cell<u64> = const { Cell::new(0) };
    static YIELDS: Cell<u32> = const { Cell::new(0) };
}

/// Thread-local fake clock so parallel test threads cannot interfere.
pub mod clock {
    use super::{NOW, YIELDS};

    pub fn now() -> u64 {
        NOW.with(|c| c.get())
    }

    pub fn advance(us: u64) {
        NOW.with(|c| c.set(c.get() + us));
    }

    pub fn yields() -> u32 {
        YIELDS.with(|c| c.get())
    }

    pub(super) fn count_yield() {
        YIELDS.with(|c| c.set(c.get() + 1));
    }
}

/// Skips past the power-on settle window so tests that don't care about
/// timing get deterministic operation logs without leading probes.
pub fn settle() {
    clock::advance(at24lc::WRITE_CYCLE_TIME_US + 2 * YIELD_STEP_US);
}

#[derive(Debug, PartialEq, Clone)]
pub enum Op {
    Probe { at: u64 },
    Write { addr: u16, len: usize, at: u64 },
    Read { addr: u16, len: usize, at: u64 },
}

/// Simulated AT24LC chip behind an embedded-hal bus: a memory image, the
/// post-write busy window (every transaction NAKs until it expires) and an
/// operation log with timestamps.
pub struct Bus {
    pub mem: Vec<u8>,
    pub page_size: usize,
    pub busy_until: u64,
    pub busy_window: u64,
    /// Chip never acknowledges presence probes; forces the driver to sit out
    /// the full write-cycle time.
    pub ack_polling_broken: bool,
    /// Writes acknowledge normally but the cells don't retain the data.
    pub discard_writes: bool,
    pub fail_after_operation: usize,
    pub operations: Vec<Op>,
}

impl Bus {
    pub fn new(model: Model) -> Self {
        Self {
            mem: vec![0xff; model.capacity()],
            page_size: model.page_size(),
            busy_until: 0,
            busy_window: BUSY_WINDOW_US,
            ack_polling_broken: false,
            discard_writes: false,
            fail_after_operation: usize::MAX,
            operations: Vec::new(),
        }
    }

    pub fn new_with_fault(model: Model, fail_after_operation: usize) -> Self {
        Self {
            fail_after_operation,
            ..Self::new(model)
        }
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    pub fn writes(&self) -> Vec<(u16, usize, u64)> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Op::Write { addr, len, at } => Some((*addr, *len, *at)),
                _ => None,
            })
            .collect()
    }

    pub fn reads(&self) -> Vec<(u16, usize, u64)> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Op::Read { addr, len, at } => Some((*addr, *len, *at)),
                _ => None,
            })
            .collect()
    }

    pub fn probes(&self) -> Vec<u64> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                Op::Probe { at } => Some(*at),
                _ => None,
            })
            .collect()
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }
}

#[derive(Debug)]
pub struct BusError(pub ErrorKind);

impl i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

impl ErrorType for Bus {
    type Error = BusError;
}

impl I2c for Bus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        assert_eq!(address, DEVICE_ADDRESS);
        let now = clock::now();

        if self.operations.len() >= self.fail_after_operation {
            println!("    bus: FAULT");
            return Err(BusError(ErrorKind::Other));
        }

        // Header and payload arrive as consecutive write segments of one
        // frame; a combined write-read carries exactly one read segment.
        let mut written: Vec<u8> = Vec::new();
        let mut requested = 0;
        for op in operations.iter() {
            match op {
                Operation::Write(bytes) => written.extend_from_slice(bytes),
                Operation::Read(buf) => requested += buf.len(),
            }
        }

        let busy = now < self.busy_until;
        if written.is_empty() && requested == 0 {
            // presence probe
            if busy || self.ack_polling_broken {
                return Err(BusError(ErrorKind::NoAcknowledge(
                    NoAcknowledgeSource::Address,
                )));
            }
            self.operations.push(Op::Probe { at: now });
            return Ok(());
        }

        if busy {
            return Err(BusError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        }

        assert!(written.len() >= 2, "transaction without word address header");
        let addr = u16::from_be_bytes([written[0], written[1]]);
        let payload = &written[2..];

        if requested > 0 {
            assert!(payload.is_empty(), "mixed write payload and read");
            assert!(
                addr as usize + requested <= self.mem.len(),
                "read past device end"
            );
            println!(
                "    bus: read:  0x{addr:04X}[0x{requested:04X}] #{:>2}",
                self.operations.len()
            );
            self.operations.push(Op::Read {
                addr,
                len: requested,
                at: now,
            });

            let mut cursor = addr as usize;
            for op in operations.iter_mut() {
                if let Operation::Read(buf) = op {
                    buf.copy_from_slice(&self.mem[cursor..cursor + buf.len()]);
                    cursor += buf.len();
                }
            }
        } else {
            // a page write may not cross the chip's internal page boundary
            assert!(
                (addr as usize % self.page_size) + payload.len() <= self.page_size,
                "write crosses page boundary: addr=0x{addr:04X} len={}",
                payload.len()
            );
            assert!(
                addr as usize + payload.len() <= self.mem.len(),
                "write past device end"
            );
            println!(
                "    bus: write: 0x{addr:04X}[0x{:04X}] #{:>2}",
                payload.len(),
                self.operations.len()
            );
            self.operations.push(Op::Write {
                addr,
                len: payload.len(),
                at: now,
            });

            if !self.discard_writes {
                self.mem[addr as usize..addr as usize + payload.len()].copy_from_slice(payload);
            }
            self.busy_until = now + self.busy_window;
        }
        Ok(())
    }
}

impl Monotonic for Bus {
    fn now_micros() -> u64 {
        clock::now()
    }

    fn yield_now() {
        clock::count_yield();
        clock::advance(YIELD_STEP_US);
    }
}

/// Recording write-protect line; `true` events are the protected state.
#[derive(Default)]
pub struct WriteProtectPin {
    pub events: Vec<(bool, u64)>,
}

impl WriteProtectPin {
    pub fn states(&self) -> Vec<bool> {
        self.events.iter().map(|(state, _)| *state).collect()
    }
}

impl digital::ErrorType for WriteProtectPin {
    type Error = Infallible;
}

impl digital::OutputPin for WriteProtectPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.events.push((false, clock::now()));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.events.push((true, clock::now()));
        Ok(())
    }
}
