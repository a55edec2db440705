//! Build & preview engine: turns a virtual file set into a servable document
//! plus module resources, with console/error capture flowing back out.

pub mod debounce;
pub mod document;
pub mod engine;
pub mod import_map;
pub mod resources;
pub mod transpile;

pub use engine::{
    BuildReport, ConsoleEntry, ConsoleKind, MissingEntryPointError, Overlay, OverlaySource,
    PreviewEngine, PreviewMessage, PreviewState, SANDBOX_POLICY,
};
