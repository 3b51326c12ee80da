pub mod ephemeral;
pub mod metric;
pub mod usage;
