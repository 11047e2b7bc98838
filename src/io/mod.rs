//! IO adapters: the compiled-workbook writer lives here; raw file
//! acquisition is in [`crate::source`].

pub mod excel_write;
