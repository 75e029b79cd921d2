pub mod trace;

pub use trace::{request_id_middleware, request_span, RequestId, REQUEST_ID_HEADER};
