// Receiver side: passive scanning, decoding and reception statistics.

pub mod scanner;
pub mod tracker;
