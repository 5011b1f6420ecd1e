//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter        | Implements         | Connects to                    |
//! |----------------|--------------------|--------------------------------|
//! | `mock_motor`   | MotorController    | In-memory first-order follower |
//! | `roboclaw`     | MotorController    | RoboClaw over packet serial    |
//! | `mock_panel`   | ControlPanel       | Scripted snapshots             |
//! | `gpio_panel`   | ControlPanel       | Console buttons on GPIO inputs |
//! | `mock_theming` | ThemingController  | Cue recorder                   |
//! | `gpio_theming` | ThemingController  | Show controller GPIO outputs   |
//! | `log_sink`     | StatusSink         | Console log lines              |
//! | `json_sink`    | StatusSink         | JSON-lines dashboard feed      |
//! | `memory_sink`  | StatusSink         | In-memory snapshot list        |

pub mod gpio_panel;
pub mod gpio_theming;
pub mod json_sink;
pub mod log_sink;
pub mod memory_sink;
pub mod mock_motor;
pub mod mock_panel;
pub mod mock_theming;
pub mod roboclaw;

pub use gpio_panel::{GpioControlPanel, PanelLines};
pub use gpio_theming::GpioThemingController;
pub use json_sink::JsonLinesSink;
pub use log_sink::LogStatusSink;
pub use memory_sink::MemoryStatusSink;
pub use mock_motor::MockMotorController;
pub use mock_panel::MockControlPanel;
pub use mock_theming::{MockThemingController, ShowStatus};
pub use roboclaw::RoboClawMotorController;
