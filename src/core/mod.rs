pub(crate) mod context;
pub(crate) mod converter;
pub(crate) mod entity;
pub(crate) mod error;
pub(crate) mod filter;
pub(crate) mod multi_map;
pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod status;
pub(crate) mod util;
