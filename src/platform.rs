use core::convert::Infallible;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::{I2c, SevenBitAddress};

/// See README.md for an example implementation.
pub trait Platform: Monotonic + I2c<SevenBitAddress> {}

impl<T: Monotonic + I2c<SevenBitAddress>> Platform for T {}

/// Monotonic microsecond clock plus the cooperative-yield hook the driver
/// spins on while the chip works through a write cycle.
pub trait Monotonic {
    fn now_micros() -> u64;

    /// Invoked on every iteration of the write-cycle wait loop and after
    /// every bus transaction. Defaults to a no-op.
    fn yield_now() {}
}

impl<T: Monotonic> Monotonic for &mut T {
    fn now_micros() -> u64 {
        T::now_micros()
    }

    fn yield_now() {
        T::yield_now()
    }
}

/// Placeholder pin type for drivers constructed without a write-protect line.
pub struct NoWriteProtect;

impl embedded_hal::digital::ErrorType for NoWriteProtect {
    type Error = Infallible;
}

impl OutputPin for NoWriteProtect {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
