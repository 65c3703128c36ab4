use super::handlers::{auth, devices, health};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Reuse the same router wiring and only return the generated OpenAPI spec.
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Add new endpoints here via `.routes(routes!(...))` so they are both
/// served and included in the generated spec. Routes added outside (like
/// `/`) are intentionally not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    // `routes!` reads #[utoipa::path] to bind HTTP method + path and add the route to OpenAPI.
    OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::login::check_email))
        .routes(routes!(auth::register::register))
        .routes(routes!(auth::verify::verify_otp))
        .routes(routes!(auth::verify::verify_email))
        .routes(routes!(auth::verify::retry_otp))
        .routes(routes!(auth::session::refresh))
        .routes(routes!(auth::session::logout))
        .routes(routes!(devices::list_devices, devices::remove_current_device))
        .routes(routes!(devices::remove_other_device))
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    let mut auth_tag = Tag::new("auth");
    auth_tag.description = Some("Login, registration, OTP, and token refresh".to_string());

    let mut devices_tag = Tag::new("devices");
    devices_tag.description = Some("Per-device session management".to_string());

    OpenApiBuilder::new()
        .info(info)
        .tags(Some(vec![auth_tag, devices_tag]))
        .build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors may include "Name <email>".
    let author = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    if author.is_empty() {
        return None;
    }

    let mut contact = Contact::new();
    if let Some(start) = author.find('<') {
        let name = author[..start].trim();
        let email = author[start + 1..].trim_end_matches('>').trim();
        contact.name = (!name.is_empty()).then(|| name.to_string());
        contact.email = (!email.is_empty()).then(|| email.to_string());
    } else {
        contact.name = Some(author.to_string());
    }
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
