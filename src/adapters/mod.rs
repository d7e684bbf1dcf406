//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements              | Connects to               |
//! |---------------|-------------------------|---------------------------|
//! | `output_bank` | ActuatorPort            | ESC / servo output slots  |
//! | `log_sink`    | EventSink, LogSink      | `log` facade              |
//! | `sim`         | SensorPort, ActuatorPort| Simulated motor plant     |

pub mod log_sink;
pub mod output_bank;
pub mod sim;
