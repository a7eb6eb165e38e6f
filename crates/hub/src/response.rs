use serde::Serialize;

/// Standard `{"data": ...}` envelope for successful responses.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
