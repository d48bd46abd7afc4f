// Direct-I/O backend: entries built on std::fs, no shell involved.

pub mod file;

pub use file::NativeFile;
