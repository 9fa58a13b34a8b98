pub mod pool_bus;

pub use pool_bus::{forward_to, ConsoleReporter, PoolBus, PoolEventSink};
