pub mod entry;
pub mod zip_container;

pub use entry::ContainerEntry;
pub use zip_container::{ContainerHandle, ZipContainer};

use crate::error::Result;
use std::io::Read;

/// Opens the content stream of an entry by its index in the container.
pub trait EntryReader {
    fn open_entry(&mut self, index: usize) -> Result<Box<dyn Read + '_>>;
}
