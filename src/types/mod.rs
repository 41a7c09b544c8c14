//! Value types shared by the protocol and the device model.

mod address;
mod colour;
mod label;
mod power;

pub use address::{DeviceAddress, SiteId};
pub use colour::Colour;
pub use label::Label;
pub use power::PowerLevel;
