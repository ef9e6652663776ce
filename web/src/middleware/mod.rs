pub(crate) mod rate_limit;
pub(crate) mod request_logger;
pub(crate) mod security_headers;
