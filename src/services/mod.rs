pub(crate) mod access;
pub(crate) mod allocation;
pub(crate) mod participants;
pub(crate) mod scoring;
pub(crate) mod tokens;
