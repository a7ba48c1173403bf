pub mod navigation;
pub mod sequencer;

pub use navigation::NavigationFlag;
pub use sequencer::{Panel, PanelSnapshot, PanelTiming, Stage};
