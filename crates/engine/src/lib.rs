//! Dispatch side of the relay: a fixed pool of workers draining the bounded
//! channel and handing each message to the delivery client.

pub mod outcome;
pub mod pool;
