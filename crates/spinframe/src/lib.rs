//! Frame-index control and asset preloading for 360° product spin viewers.

pub mod controller;
pub mod fetch;
pub mod input;
pub mod listeners;
pub mod macros;
pub mod preload;
pub mod protocol;
pub mod sequence;

pub use controller::{GesturePhase, InputResponse, SENSITIVITY_THRESHOLD, SpinController, Step};
pub use fetch::{AssetFetcher, AssetSource, FetchError};
pub use input::{Channel, InputEvent, Point, Rig};
pub use listeners::{Listeners, Subscription};
pub use preload::{PreloadProgress, Preloader};
pub use sequence::{FrameAddress, FrameSequence};
