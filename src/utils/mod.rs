pub mod background;
pub mod shutdown;

pub use background::BackgroundTasks;
