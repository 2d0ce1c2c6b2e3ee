pub(crate) mod errors;
pub(crate) mod handlers;
pub(crate) mod ops;
pub(crate) mod pagination;
pub(crate) mod papers;
pub(crate) mod results;
pub(crate) mod router;
pub(crate) mod submissions;
pub(crate) mod uploads;
pub(crate) mod validation;
