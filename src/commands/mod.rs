// Listing commands
pub mod hosts;
pub mod jobs;
pub mod tasks;

// Inspection commands
pub mod modules;
pub mod registry;
pub mod show;
