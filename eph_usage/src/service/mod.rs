pub(crate) mod usage;
