pub(crate) mod answer_keys;
pub(crate) mod health;
pub(crate) mod papers;
pub(crate) mod results;
pub(crate) mod submissions;
