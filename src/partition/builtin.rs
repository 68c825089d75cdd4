//! Built-in state machines.
//!
//! - `echo`: replies with its input.
//! - `counter`: a signed 64-bit counter. Commands add a big-endian `i64`
//!   delta (empty input adds 1) and reply with the new value; queries reply
//!   with the current value.

use super::state_machine::{ApplyContext, StateMachine, StateMachineRegistry};
use super::sink::ResultSink;
use bytes::Bytes;

/// Register every built-in machine.
pub fn register_builtins(registry: &mut StateMachineRegistry) {
    registry.register("echo", || Box::new(EchoStateMachine));
    registry.register("counter", || Box::new(CounterStateMachine::default()));
}

/// Replies to every request with its input.
#[derive(Debug, Default)]
pub struct EchoStateMachine;

impl StateMachine for EchoStateMachine {
    fn command(&mut self, _ctx: &ApplyContext, input: Bytes, sink: ResultSink) {
        sink.reply(input);
    }

    fn query(&self, _ctx: &ApplyContext, input: Bytes, sink: ResultSink) {
        sink.reply(input);
    }
}

/// Signed counter.
#[derive(Debug, Default)]
pub struct CounterStateMachine {
    value: i64,
}

impl CounterStateMachine {
    /// Current counter value.
    pub fn value(&self) -> i64 {
        self.value
    }

    fn parse_delta(input: &[u8]) -> Result<i64, String> {
        match input.len() {
            0 => Ok(1),
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(input);
                Ok(i64::from_be_bytes(raw))
            }
            n => Err(format!("counter delta must be 0 or 8 bytes, got {}", n)),
        }
    }
}

impl StateMachine for CounterStateMachine {
    fn command(&mut self, _ctx: &ApplyContext, input: Bytes, sink: ResultSink) {
        match Self::parse_delta(&input) {
            Ok(delta) => {
                self.value = self.value.wrapping_add(delta);
                sink.reply(Bytes::copy_from_slice(&self.value.to_be_bytes()));
            }
            Err(message) => sink.fail(message),
        }
    }

    fn query(&self, _ctx: &ApplyContext, _input: Bytes, sink: ResultSink) {
        sink.reply(Bytes::copy_from_slice(&self.value.to_be_bytes()));
    }
}

/// Decode a counter reply.
pub fn decode_counter(output: &[u8]) -> Option<i64> {
    let raw: [u8; 8] = output.try_into().ok()?;
    Some(i64::from_be_bytes(raw))
}
