pub mod failure_alert;
pub mod request_id;

pub use failure_alert::failure_alert;
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
