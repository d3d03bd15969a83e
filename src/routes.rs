use crate::{
    api::checkin,
    auth::{handlers, middleware::auth_middleware},
    config::Config,
    error::ApiError,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{Scope, middleware::from_fn, web};
use std::sync::Arc;

/// Malformed JSON bodies and query strings get the same envelope as every
/// other failure.
fn extractor_configs() -> (web::JsonConfig, web::QueryConfig) {
    let json = web::JsonConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("Invalid request body: {err}")).into()
    });
    let query = web::QueryConfig::default().error_handler(|err, _req| {
        ApiError::Validation(format!("Invalid query parameters: {err}")).into()
    });
    (json, query)
}

/// `/checkin` routes. Expects an `AuthUser` in request extensions, i.e. to be
/// mounted under a scope wrapped with `auth_middleware`.
pub fn checkin_scope() -> Scope {
    let (json, query) = extractor_configs();

    web::scope("/checkin")
        .app_data(json)
        .app_data(query)
        // /checkin
        .service(web::resource("").route(web::post().to(checkin::create_checkin)))
        .service(web::resource("/clients").route(web::get().to(checkin::list_clients)))
        .service(web::resource("/checkout").route(web::put().to(checkin::checkout)))
        .service(web::resource("/history").route(web::get().to(checkin::history)))
        .service(web::resource("/history/report").route(web::get().to(checkin::history_report)))
        .service(web::resource("/active").route(web::get().to(checkin::active)))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let per_ms = (60_000 / requests_per_min as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            // both values are non-zero, the only case finish() rejects
            .unwrap_or_default();
        Governor::new(&cfg)
    }

    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));
    let (json, _) = extractor_configs();

    // Public routes
    cfg.service(
        web::scope("/auth")
            .app_data(json)
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/register")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::register)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(checkin_scope()),
    );
}
