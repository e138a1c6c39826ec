mod auth;
mod config;
mod error;
mod hub;
mod middleware;
mod models;
mod routes;
mod service;
mod stage;
mod store;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;

use crate::middleware::RequestLogger;
use crate::routes as app_routes;
use crate::stage::stage_relay;
use rocket::data::{ByteUnit, Limits};
use rocket::{Build, Rocket, catchers, http::Method};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_okapi::swagger_ui::{SwaggerUIConfig, make_swagger_ui};
use rocket_okapi::{get_openapi_route, okapi::merge::marge_spec_list};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG takes precedence over the configured level, e.g.
    //   RUST_LOG=bag_relay::hub=debug       - trace socket traffic
    //   RUST_LOG=info,bag_relay::store=debug - storage details only
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // A second rocket in the same process (tests) keeps the first subscriber.
    let _ = if json_format {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
}

fn ensure_rocket_secret_key() {
    let profile = std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());

    // Session cookies are private; outside debug they must survive restarts.
    if profile != "debug" && std::env::var("ROCKET_SECRET_KEY").is_err() {
        panic!(
            "ROCKET_SECRET_KEY is required for profile '{}'. Generate one with: openssl rand -base64 32",
            profile
        );
    }
}

fn build_cors(cors_config: &config::CorsConfig) -> CorsOptions {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    if is_wildcard && cors_config.allow_credentials {
        panic!(
            "Invalid CORS configuration: Cannot use wildcard origins (*) with credentials enabled. \
            Either set specific origins or disable credentials."
        );
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Post, Method::Options, Method::Head]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Accept"]),
        allow_credentials: cors_config.allow_credentials,
        ..Default::default()
    }
}

fn get_swagger_config(openapi_url: &str) -> SwaggerUIConfig {
    SwaggerUIConfig {
        url: openapi_url.to_string(),
        ..Default::default()
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    normalized
}

fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    if base.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

struct RouteSpec {
    path: &'static str,
    routes: Vec<rocket::Route>,
    openapi: rocket_okapi::okapi::openapi3::OpenApi,
}

fn collect_route_specs() -> Vec<RouteSpec> {
    let (location_routes, location_openapi) = app_routes::location::routes();
    let (pdf_routes, pdf_openapi) = app_routes::pdf::routes();
    let (configuration_routes, configuration_openapi) = app_routes::configuration::routes();
    let (device_routes, device_openapi) = app_routes::devices::routes();
    let (emergency_routes, emergency_openapi) = app_routes::emergency::routes();

    // The relay's endpoints sit directly under the base path.
    vec![
        RouteSpec {
            path: "",
            routes: location_routes,
            openapi: location_openapi,
        },
        RouteSpec {
            path: "",
            routes: pdf_routes,
            openapi: pdf_openapi,
        },
        RouteSpec {
            path: "",
            routes: configuration_routes,
            openapi: configuration_openapi,
        },
        RouteSpec {
            path: "",
            routes: device_routes,
            openapi: device_openapi,
        },
        RouteSpec {
            path: "",
            routes: emergency_routes,
            openapi: emergency_openapi,
        },
    ]
}

fn mount_api_routes(mut rocket: Rocket<Build>, base_path: &str, enable_swagger: bool) -> Rocket<Build> {
    let route_specs = collect_route_specs();

    if enable_swagger {
        let mut openapi_list = Vec::new();
        for spec in route_specs {
            rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
            openapi_list.push((spec.path, spec.openapi));
        }

        let openapi_docs = match marge_spec_list(&openapi_list) {
            Ok(docs) => docs,
            Err(err) => panic!("Could not merge OpenAPI spec: {}", err),
        };

        let settings = rocket_okapi::settings::OpenApiSettings::default();
        rocket = rocket.mount(base_path, vec![get_openapi_route(openapi_docs, &settings)]);

        let docs_path = join_base_path(base_path, "docs");
        let openapi_url = join_base_path(base_path, "openapi.json");
        rocket = rocket.mount(docs_path, make_swagger_ui(&get_swagger_config(&openapi_url)));
    } else {
        for spec in route_specs {
            rocket = rocket.mount(format!("{}{}", base_path, spec.path), spec.routes);
        }
    }

    rocket
}

fn build_limits(limits: &config::LimitsConfig) -> Limits {
    let json = ByteUnit::Mebibyte(limits.json_mib);
    let form = ByteUnit::Mebibyte(limits.form_mib);
    Limits::default()
        .limit("json", json)
        .limit("data-form", form)
        .limit("file", form)
        .limit("bytes", form)
}

pub fn build_rocket(config: Config) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);
    ensure_rocket_secret_key();

    let cors = build_cors(&config.cors).to_cors().expect("Failed to create CORS fairing");

    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port))
        .merge(("limits", build_limits(&config.limits)));

    let base_path = normalize_base_path(&config.api.base_path);
    let enable_swagger = config.api.enable_swagger;

    let mut rocket = rocket::custom(figment)
        .attach(stage_relay(config.clone()))
        .attach(cors)
        .attach(RequestLogger)
        .manage(config);

    rocket = mount_api_routes(rocket, &base_path, enable_swagger);

    rocket
        .mount(base_path.as_str(), app_routes::auth::routes())
        .mount(base_path.as_str(), app_routes::configuration::upload_routes())
        .mount(join_base_path(&base_path, "health"), app_routes::health::routes())
        .mount("/", app_routes::socket::routes())
        .register(
            "/",
            catchers![
                app_routes::error::bad_request,
                app_routes::error::unauthorized,
                app_routes::error::forbidden,
                app_routes::error::not_found,
                app_routes::error::payload_too_large,
                app_routes::error::unprocessable_entity,
                app_routes::error::internal_error
            ],
        )
}
