pub mod catalog;
pub mod detector;
pub mod gamemode;
pub mod options;
pub mod policy;
pub mod process;
pub mod settings;
pub mod suspend;
pub mod tweaks;

#[cfg(test)]
pub(crate) mod fakes;
