use super::ast::BlockId;
use super::number::NumericValue;
use log::trace;
use std::fmt;

/// Observable interpreter events.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<'a> {
    Statement { line: usize },
    Assign { name: &'a str, value: &'a NumericValue },
    Call { function: &'a str, depth: usize },
    Return { function: &'a str, value: Option<&'a NumericValue> },
    Output { text: &'a str },
    ReverseForward { block: BlockId, entries: usize },
    ReverseRollback { block: BlockId, entries: usize },
}

impl<'a> fmt::Display for Event<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Event::Statement { line } => write!(f, "line {}", line),
            Event::Assign { name, value } => write!(f, "{} = {}", name, value),
            Event::Call { function, depth } => write!(f, "call {} (depth {})", function, depth),
            Event::Return {
                function,
                value: Some(value),
            } => write!(f, "return {} = {}", function, value),
            Event::Return {
                function,
                value: None,
            } => write!(f, "return {}", function),
            Event::Output { text } => write!(f, "output {:?}", text),
            Event::ReverseForward { block, entries } => {
                write!(f, "reverse @{} applied {} update(s)", block.0, entries)
            }
            Event::ReverseRollback { block, entries } => {
                write!(f, "reverse @{} rolled back {} update(s)", block.0, entries)
            }
        }
    }
}

/// Receives events from a single interpreter session.
pub trait Tracer {
    fn event(&mut self, event: &Event);
}

#[derive(Debug, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    fn event(&mut self, _event: &Event) {}
}

/// Forwards events to the `log` facade at trace level.
#[derive(Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn event(&mut self, event: &Event) {
        trace!("{}", event);
    }
}

/// Keeps every event as a formatted line.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    pub events: Vec<String>,
}

impl Tracer for Recorder {
    fn event(&mut self, event: &Event) {
        self.events.push(event.to_string());
    }
}

impl<T: Tracer + ?Sized> Tracer for &mut T {
    fn event(&mut self, event: &Event) {
        (**self).event(event)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_recorder() {
        let mut recorder = Recorder::default();
        let value = NumericValue::Int(3);
        recorder.event(&Event::Assign {
            name: "x",
            value: &value,
        });
        recorder.event(&Event::Return {
            function: "f",
            value: None,
        });
        recorder.event(&Event::ReverseRollback {
            block: BlockId(12),
            entries: 2,
        });
        assert_eq!(
            recorder.events,
            vec!["x = 3", "return f", "reverse @12 rolled back 2 update(s)"]
        );
    }
}
