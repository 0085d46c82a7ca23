pub(crate) mod analytics;
pub(crate) mod banks;
pub(crate) mod invites;
pub(crate) mod public_links;
pub(crate) mod questions;
pub(crate) mod sessions;
pub(crate) mod submissions;
pub(crate) mod users;
