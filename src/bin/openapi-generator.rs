//! Dumps the OpenAPI document to stdout for frontend codegen.

use cluegrid_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

fn main() {
    let doc = ApiDoc::openapi();
    println!("{}", doc.to_pretty_json().unwrap());
}
