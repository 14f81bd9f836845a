pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::commands::AppState;
pub use application::resolver::{DayFeed, Occurrence, ScheduleBlockSlot};
pub use domain::models::{Category, Task, TaskKind};
pub use infrastructure::error::CoreError;
