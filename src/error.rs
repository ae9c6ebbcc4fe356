use std::fmt;

/// An error returned by a [`HashTable`](crate::HashTable) operation.
///
/// Every variant is recoverable. Inserting a duplicate key or touching a missing key
/// are not errors; those are reported through the operation's normal return value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// The table could not be constructed from the given configuration.
    InvalidArgument(Argument),

    /// A bucket index, either requested directly or produced by the hash function,
    /// falls outside `0..buckets`.
    OutOfRange { index: isize, buckets: usize },

    /// The operation was attempted after a stop was requested.
    Stopped,

    /// Teardown was attempted before a stop was requested.
    NotYetStopped,

    /// A stop was already requested for this table.
    AlreadyStopped,

    /// The table was already torn down.
    Destroyed,
}

/// The configuration argument rejected by [`Error::InvalidArgument`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Argument {
    /// The bucket count was zero.
    Buckets,

    /// No hash function was provided.
    Hasher,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(Argument::Buckets) => {
                write!(f, "bucket count must be at least one")
            }
            Error::InvalidArgument(Argument::Hasher) => write!(f, "no hash function provided"),
            Error::OutOfRange { index, buckets } => {
                write!(f, "bucket index {index} is out of range for {buckets} buckets")
            }
            Error::Stopped => write!(f, "table has been stopped"),
            Error::NotYetStopped => write!(f, "table must be stopped before it is destroyed"),
            Error::AlreadyStopped => write!(f, "table was already stopped"),
            Error::Destroyed => write!(f, "table was already destroyed"),
        }
    }
}

impl std::error::Error for Error {}
