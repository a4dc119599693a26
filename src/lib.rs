//! feedpane: a terminal feed reader whose article pane pages, filters and
//! searches a local SQLite library.

pub mod backend;
pub mod config;
pub mod controller;
pub mod storage;
pub mod util;
