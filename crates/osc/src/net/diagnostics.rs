use std::sync::Arc;

use parking_lot::RwLock;

use super::handlers::{HandlerId, HandlerRegistry};
use crate::error::OscError;

/// Destination for errors nobody subscribed to.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, error: &OscError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&self, error: &OscError) {
        eprintln!("oscport: {}", error);
    }
}

/// Forwards to the `log` facade at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, error: &OscError) {
        log::error!("{}", error);
    }
}

pub(crate) struct ErrorChannel {
    handlers: HandlerRegistry<OscError>,
    sink: RwLock<Arc<dyn DiagnosticSink>>,
}

impl ErrorChannel {
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            sink: RwLock::new(Arc::new(StderrSink)),
        }
    }

    pub fn add<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&OscError) + Send + Sync + 'static,
    {
        self.handlers.add(handler)
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        self.handlers.remove(id)
    }

    pub fn set_sink(&self, sink: Arc<dyn DiagnosticSink>) {
        *self.sink.write() = sink;
    }

    pub fn report(&self, error: &OscError) {
        if !self.handlers.emit(error) {
            self.fallback(error);
        }
    }

    fn fallback(&self, error: &OscError) {
        let sink = self.sink.read().clone();
        sink.report(error);
    }
}
