//! The eight tracker modules.

pub mod app;
pub mod cloud;
pub mod data;
pub mod location;
pub mod modem;
pub mod sensor;
pub mod ui;
pub mod util;

pub use app::{AppModule, SamplingPolicy};
pub use cloud::CloudModule;
pub use data::DataModule;
pub use location::LocationModule;
pub use modem::ModemModule;
pub use sensor::SensorModule;
pub use ui::UiModule;
pub use util::UtilModule;
