#![doc = include_str!("../README.md")]

mod batch;
mod error;
mod raw;
mod table;

pub use batch::{Action, Operation, Outcome};
pub use error::{Argument, Error};
pub use raw::Phase;
pub use table::{HashFn, HashTable, HashTableBuilder, TableRef};
