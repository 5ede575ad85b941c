pub mod contracts;
pub mod tx_sender;
