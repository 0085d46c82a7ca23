pub(crate) mod analytics;
pub(crate) mod banks;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod sharing;
pub(crate) mod taking;
pub(crate) mod tests;
