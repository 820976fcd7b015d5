pub mod cors;
pub mod resource;

use actix_web::web;

use crate::response::{path_error_handler, query_error_handler};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .app_data(web::PathConfig::default().error_handler(path_error_handler))
        .service(
            web::scope("/api/v1")
                .service(web::scope("/resources").configure(resource::config)),
        );
}
