//! Interpreter configuration: the one
//! piece of ambient, host-supplied tuning the engine reads (the eventless
//! loop's iteration cap). Deserializable so a host can ship it next to
//! whatever config format it already uses, the way the wider pack's
//! services load a small `serde`-derived settings struct rather than
//! wiring constants by hand.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Hard cap on eventless microsteps run per macrostep before the
    /// engine gives up and returns to the caller in its last-stable
    /// configuration ("recommendation is to log and
    /// continue, matching source behavior").
    pub eventless_cycle_cap: u32,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig { eventless_cycle_cap: 100 }
    }
}
