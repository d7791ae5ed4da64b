pub mod channel;
pub mod fix;
pub mod sink;

pub use channel::{Channel, ChannelError, ChannelResult, MemoryChannel, MemorySubscription};
pub use fix::{DecodeError, Fix};
pub use sink::{JsonLinesSink, MemorySink, PersistenceError, PersistenceResult, PersistenceSink};
