use rocket::Responder;
use rocket::http::{ContentType, Header};
use rocket_okapi::OpenApiError;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::response::OpenApiResponderInner;

/// A stored file sent back as a download.
#[derive(Responder, Debug)]
pub struct Attachment {
    body: Vec<u8>,
    content_type: ContentType,
    disposition: Header<'static>,
}

impl Attachment {
    pub fn new(filename: &str, content_type: ContentType, body: Vec<u8>) -> Self {
        let filename = filename.replace(['"', '\\'], "_");
        Self {
            body,
            content_type,
            disposition: Header::new("Content-Disposition", format!("attachment; filename=\"{filename}\"")),
        }
    }
}

impl OpenApiResponderInner for Attachment {
    fn responses(_gen: &mut OpenApiGenerator) -> Result<Responses, OpenApiError> {
        let mut responses = Responses::default();
        responses.responses.insert(
            "200".to_string(),
            RefOr::Object(OpenApiResponse {
                description: "File download".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}
