use super::handlers::{auth, checkin, classes, health, users};
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let (_router, openapi) = api_router().split_for_parts();
    openapi
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Routes added outside (like `/` or `OPTIONS /health`) are not documented.
pub(crate) fn api_router() -> OpenApiRouter {
    let mut router = OpenApiRouter::with_openapi(cargo_openapi())
        .routes(routes!(health::health))
        .routes(routes!(auth::login::login))
        .routes(routes!(auth::federated::federated))
        .routes(routes!(auth::session::session))
        .routes(routes!(auth::session::logout))
        .routes(routes!(users::create_profile))
        .routes(routes!(classes::create_class, classes::list_classes))
        .routes(routes!(classes::get_class))
        .routes(routes!(checkin::check_in));

    let tags = [
        ("rollcall", "Class attendance API"),
        ("auth", "Device-gated login and sessions"),
        ("users", "Profile registration"),
        ("classes", "Class creation and lookup"),
        ("checkin", "QR check-in"),
    ]
    .into_iter()
    .map(|(name, description)| {
        let mut tag = Tag::new(name);
        tag.description = Some(description.to_string());
        tag
    })
    .collect();

    router.get_openapi_mut().tags = Some(tags);

    router
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

    OpenApiBuilder::new().info(info).build()
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    Some(value.trim()).filter(|trimmed| !trimmed.is_empty())
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        Some(value).filter(|v| !v.is_empty())
    }
    match author.split_once('<') {
        Some((name, email)) => (
            non_empty(name.trim()),
            non_empty(email.trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let spec = openapi();
        assert_eq!(spec.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(spec.info.version, env!("CARGO_PKG_VERSION"));

        let contact = spec.info.contact;
        assert!(contact.is_some());
        if let Some(contact) = contact {
            assert_eq!(contact.name.as_deref(), Some("Team Rollcall"));
            assert_eq!(contact.email.as_deref(), Some("team@rollcall.dev"));
        }

        let license = spec.info.license;
        assert!(license.is_some());
        if let Some(license) = license {
            assert_eq!(license.identifier.as_deref(), Some("BSD-3-Clause"));
        }
    }

    #[test]
    fn openapi_documents_attendance_routes() {
        let spec = openapi();
        let tags = spec.tags.clone().unwrap_or_default();
        assert!(tags.iter().any(|tag| tag.name == "checkin"));
        for path in [
            "/health",
            "/v1/auth/login",
            "/v1/auth/federated",
            "/v1/auth/session",
            "/v1/auth/logout",
            "/v1/users/profile",
            "/v1/classes",
            "/v1/classes/{class_id}",
            "/v1/checkin",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn parse_author_variants() {
        assert_eq!(
            parse_author("Team Rollcall <team@rollcall.dev>"),
            (Some("Team Rollcall"), Some("team@rollcall.dev"))
        );
        assert_eq!(parse_author("Solo"), (Some("Solo"), None));
        assert_eq!(parse_author("<only@mail>"), (None, Some("only@mail")));
    }
}
