//! Receivers for the parser's three outward channels.

use crate::sans::{record::Record, scan::FrameError, state::ParserState};

/// Receive state updates, records and frame errors from a parser.
///
/// All three channels fire reliably: downstream persistence depends on
/// seeing every state, and monitoring on seeing every frame error.
///
/// For each change, the new state is reported first, then the record or
/// error that caused it. An application that persists each state as it
/// arrives therefore never persists a position earlier than a record it has
/// already been handed.
pub trait ParserSink {
    /// Receive the full parser state after a change.
    fn state_changed(&mut self, state: &ParserState);
    /// Receive a record as it is emitted.
    fn publish(&mut self, record: &Record);
    /// Receive a non-fatal frame error.
    fn exception(&mut self, error: &FrameError);
}

impl<K: ParserSink + ?Sized> ParserSink for &mut K {
    fn state_changed(&mut self, state: &ParserState) {
        (**self).state_changed(state)
    }

    fn publish(&mut self, record: &Record) {
        (**self).publish(record)
    }

    fn exception(&mut self, error: &FrameError) {
        (**self).exception(error)
    }
}

/// A sink calling one closure per channel.
pub struct Callbacks<S, P, E> {
    pub state: S,
    pub publish: P,
    pub exception: E,
}

impl<S, P, E> ParserSink for Callbacks<S, P, E>
where
    S: FnMut(&ParserState),
    P: FnMut(&Record),
    E: FnMut(&FrameError),
{
    fn state_changed(&mut self, state: &ParserState) {
        (self.state)(state)
    }

    fn publish(&mut self, record: &Record) {
        (self.publish)(record)
    }

    fn exception(&mut self, error: &FrameError) {
        (self.exception)(error)
    }
}

/// A sink keeping everything it receives.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    pub states: Vec<ParserState>,
    pub records: Vec<Record>,
    pub exceptions: Vec<FrameError>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently reported state.
    pub fn last_state(&self) -> Option<&ParserState> {
        self.states.last()
    }
}

impl ParserSink for Collector {
    fn state_changed(&mut self, state: &ParserState) {
        self.states.push(state.clone());
    }

    fn publish(&mut self, record: &Record) {
        self.records.push(record.clone());
    }

    fn exception(&mut self, error: &FrameError) {
        self.exceptions.push(error.clone());
    }
}
