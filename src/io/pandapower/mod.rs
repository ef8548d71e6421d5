pub mod create;
pub mod file_io;
pub mod network_converter;
pub use create::*;
pub use file_io::*;
