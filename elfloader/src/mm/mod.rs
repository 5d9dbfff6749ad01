//! Boot-time translation tables.

pub mod boot_vspace;
pub mod page_table;

pub use boot_vspace::BootTables;
pub use page_table::{Descriptor, PageTable};
