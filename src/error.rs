use thiserror::Error;

/// Errors that can occur during EEPROM operations. Marked as non-exhaustive to
/// allow for future additions without breaking the API. All failures are local
/// to the call that hit them; nothing here is fatal to the driver instance.
#[derive(Error, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The address, or address plus length, exceeds the device capacity.
    /// Detected before any bus activity, so no transactions were issued.
    #[error("address out of range")]
    OutOfRange,

    /// The bus transport reported a failure. The operation that hit it is
    /// aborted; details were logged at the failure site.
    #[error("i2c transport error")]
    Bus,

    /// Read-back after a write or update did not match the data written,
    /// even though the bus acknowledged every transaction. The primary
    /// data-integrity signal a write caller should act on.
    #[error("verification mismatch")]
    Verify,
}
