//! Tooling around ID/OOD generative-model experiments: metric bundle
//! inspection, region charts, dataset partitioning and NIQE reference
//! model training.

pub mod app;
pub mod color;
pub mod data;
pub mod inspect;
pub mod niqe;
pub mod partition;
pub mod render;
pub mod state;
pub mod ui;
pub mod visualize;
