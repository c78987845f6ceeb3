pub mod pipeline;
pub mod scsim_commands;
