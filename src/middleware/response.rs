use serde::Serialize;

use crate::api::Json;

/// `{"message": "..."}` body returned by deletes and other acknowledgements
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

pub fn message(text: impl Into<String>) -> Json<Message> {
    Json(Message { message: text.into() })
}
