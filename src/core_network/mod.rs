pub mod connection;
pub mod network;
pub mod pasv;

#[cfg(test)]
pub mod mock;
