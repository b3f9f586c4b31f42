// Passive data transfers and the directory listing format they emit
pub mod listing;
pub mod passive;
