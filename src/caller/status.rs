//! Service status codes carried in response bodies.

/// The request was executed successfully.
pub const SUCCESS: i32 = 0;
/// A request with the same request id was already received and this one was
/// rejected.
pub const IDEMPOTENT: i32 = 409;
/// Operation information was lost due to an unknown exception.
pub const OPERATION_LOSS: i32 = 410;
/// The server asks the client to slow down; this request was rejected.
pub const TOO_MANY_REQUEST: i32 = 429;

pub fn is_success(code: i32) -> bool {
    code == SUCCESS || code == 200
}

/// Uploads rejected as idempotent duplicates still count as delivered.
pub fn is_upload_success(code: i32) -> bool {
    code == SUCCESS || code == IDEMPOTENT
}

pub fn is_server_overload(code: i32) -> bool {
    code == TOO_MANY_REQUEST
}

pub fn is_loss_operation(code: i32) -> bool {
    code == OPERATION_LOSS
}
