pub mod api;
pub mod camera;
pub mod config;
pub mod joint;
pub mod logging;
pub mod mcp;
pub mod signal;

// Re-export commonly used items
pub use api::AppState;
pub use camera::{StreamConfig, StreamLauncher};
pub use joint::{JointController, SimulatedArm};
pub use mcp::{CobotMcpBridge, Dispatcher};
