use actix_web::{
    error::{PathError, QueryPayloadError},
    HttpRequest, HttpResponse, ResponseError,
};
use serde::Serialize;

use crate::error::AppError;

#[derive(Serialize)]
pub struct ResultMessage {
    pub message: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct RecordId {
    pub id: i64,
}

#[derive(Serialize, Debug, PartialEq, Default)]
pub struct RecordIds {
    pub ids: Vec<i64>,
}

impl RecordIds {
    pub fn add_element(&mut self, id: i64) {
        self.ids.push(id);
    }
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::param_error(format!("invalid query: {}", err)).into()
}

pub fn path_error_handler(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::param_error(format!("invalid path: {}", err)).into()
}

pub fn response_from_error(err: &AppError) -> HttpResponse {
    HttpResponse::build(err.status_code()).json(ResultMessage {
        message: err.msg().to_string(),
    })
}
