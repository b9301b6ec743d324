mod channel_sources;
mod result_bus;

pub use channel_sources::{ChannelSignalSource, ChannelTickSource};
pub use result_bus::{EventListener, LoggingDeadLetterSink, LoggingEventListener, ResultBus, TradingEvent};
