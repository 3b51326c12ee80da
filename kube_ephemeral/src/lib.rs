pub mod ephemeral;
