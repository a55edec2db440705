//! AI-assisted coding studio.
//!
//! A user instruction drives an autonomous loop of backend rounds that edit an
//! in-memory project; a preview engine turns that project into a runnable
//! document. The crate is split the same way:
//!
//! - **[`core`]**: Pure data and rules (file set, conversation log, response
//!   normalization, merge rule, export naming). No I/O.
//! - **[`io`]**: Side effects (HTTP backends, prompt rendering, config, project
//!   directories).
//! - **[`looping`]** and **[`session`]**: the loop controller and the shell
//!   state it runs against.
//! - **[`preview`]**: build pipeline, resource store, and rebuild driver.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod preview;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
