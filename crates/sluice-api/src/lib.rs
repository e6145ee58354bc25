//! # sluice-api
//!
//! Request-facing layer of the data API: the fixed error taxonomy and its
//! JSON envelope, request correlation ids, and [`DataApi`], which turns
//! parsed request documents into identity-scoped statements and classified
//! outcomes.

pub mod error;
pub mod ops;
pub mod request;
pub mod service;

pub use error::{ApiError, ErrorCode, ErrorResponse};
pub use ops::{CountRequest, DeleteRequest, InsertRequest, Operation, SelectRequest, UpdateRequest};
pub use request::{
    CORRELATION_ID_HEADER, REQUEST_ID_HEADER, RequestId, extract_request_id, request_id_middleware,
};
pub use service::{DataApi, MutationResponse, RequestContext, SelectResponse};
