//! File generators run on `onGenerateFiles`.

pub mod entry;
