//! Client-side state engine for composing battery site configurations
//!
//! Owns a set of design tabs, enforces the transformer balancing rule on every
//! edit, keeps each tab's computed layout in step with its configuration, and
//! saves designs to a remote session store while mirroring the workspace to
//! local disk.

#![forbid(unsafe_code)]

pub mod constants;
pub mod layout_sync;
pub mod persistence;
pub mod remote;
pub mod sessions;
pub mod settings;
pub mod tabs;
pub mod types;
pub mod validator;
pub mod workbench;

pub use settings::Settings;
pub use workbench::Workbench;
