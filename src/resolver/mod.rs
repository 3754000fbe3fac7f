//! Pointer Resolver
//!
//! Maps pointer samples over a container onto the nearest generated gaze
//! image and tracks which asset should be on screen.

pub mod pointer;
pub mod asset;
pub mod tracker;
pub mod session;

pub use pointer::{normalize, PointerSample, Viewport};
pub use asset::{AssetLoader, AssetState, DirAssetLoader, LoadedAsset};
pub use tracker::{reduce, AssetTicket, GazeTracker, Transition};
pub use session::{GazeSession, PointerEvent};
