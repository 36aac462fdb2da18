//! `tracing-subscriber` layer writing events through a [`Logger`].

use std::fmt::{self, Write as _};

use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context};

use crate::{
    logger::Logger, priority::Severity, rate_limited_warner::RateLimitedWarner, writer,
};

/// Severity a `tracing` level is written at.
pub fn map_tracing_level(level: Level) -> Severity {
    if level == Level::ERROR {
        Severity::Err
    } else if level == Level::WARN {
        Severity::Warning
    } else if level == Level::INFO {
        Severity::Info
    } else {
        Severity::Debug
    }
}

/// Collects the `message` field and appends other fields as `key=value`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_owned()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}

/// Layer forwarding every event to a [`Logger`].
#[derive(Debug)]
pub struct RlogLayer {
    logger: Logger,
    warner: RateLimitedWarner,
}

impl RlogLayer {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            warner: RateLimitedWarner::default(),
        }
    }
}

impl<S: Subscriber> Layer<S> for RlogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if writer::is_emitting() {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let severity = map_tracing_level(*event.metadata().level());
        if let Err(err) = self.logger.log(severity, &visitor.finish()) {
            self.warner.record();
            self.warner.warn_if_due(|count| {
                eprintln!("rlog: failed to write {count} tracing event(s): {err}");
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{Backend, LineFlags};
    use crate::stderr::{SeverityMask, StderrWriter};
    use rstest::rstest;
    use std::io::{self, Write};
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct Capture(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[rstest]
    #[case(Level::ERROR, Severity::Err)]
    #[case(Level::WARN, Severity::Warning)]
    #[case(Level::INFO, Severity::Info)]
    #[case(Level::DEBUG, Severity::Debug)]
    #[case(Level::TRACE, Severity::Debug)]
    fn maps_levels(#[case] level: Level, #[case] want: Severity) {
        assert_eq!(map_tracing_level(level), want);
    }

    #[rstest]
    fn events_reach_the_backend() {
        let capture = Capture::default();
        let writer = StderrWriter::with_sink(capture.clone(), SeverityMask::ALL);
        let logger = Logger::with_backend(Backend::Stderr(writer)).with_flags(LineFlags::NONE);
        let subscriber = tracing_subscriber::registry().with(RlogLayer::new(logger));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(shard = 3, "replica lagging");
        });

        let text = String::from_utf8_lossy(&capture.0.lock()).into_owned();
        assert!(
            text.ends_with("warning-> replica lagging shard=3\n"),
            "got {text}"
        );
    }
}
