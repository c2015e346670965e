//! Wipe: paint a mask over unwanted regions of an image, erase them to
//! transparency and stamp text over the result.

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{BrushConfig, DisplayRect, MaskSurface, Point, Size};
pub use io::{ExportError, ExportFormat, LoadError};
pub use project::{ProcessError, Session, SlotId};
pub use settings::EditorSettings;
