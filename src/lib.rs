//! viewkit
//!
//! View lifecycle, routed viewports and history coordination on a headless document.
//!
//! The [`toolkit::Toolkit`] owns the shared services. Views ([`view::View`]) load data, render
//! templates with nested includes and attach to the document. A [`viewport::Viewport`] maps
//! paths to views through a route tree, swaps them with [`transition`]s and keeps the
//! [`history::HistoryLog`] in step.
//!
//! Everything runs on a single thread; asynchronous steps are `futures` driven by a local
//! executor.

pub mod clock;
pub mod config;
pub mod dom;
pub mod error;
pub mod events;
pub mod history;
pub mod loader;
pub mod logging;
pub mod registry;
pub mod site;
pub mod toolkit;
pub mod transition;
pub mod view;
pub mod viewport;
