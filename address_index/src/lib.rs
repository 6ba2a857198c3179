pub mod import_export;
mod index;

pub use index::AddressIndex;
