pub mod info;
pub mod pack;
pub mod unpack;

pub use info::{info_archive, InfoArchiveArgs};
pub use pack::{pack_directory, PackDirectoryArgs};
pub use unpack::{unpack_archive, UnpackArchiveArgs};
