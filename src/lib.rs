//! Core library of the *Concert Signup Controller*
//!
//! Reconciles event participation between the file backed participation
//! ledger (authoritative for capacity) and the external booking service
//! (authoritative for paid reservations).
use crate::bookings::BookingApiClient;
use crate::identity::IdentityContext;
use crate::settings::Settings;
use crate::store::ParticipationStore;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::web::Data;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::net::Ipv6Addr;

pub mod api;
pub mod bookings;
pub mod cli;
pub mod identity;
pub mod logging;
pub mod services;
pub mod settings;
pub mod store;

/// Wrapper of the main function. Correctly outputs the error to the logging utility or stderr.
pub async fn try_or_exit<T, F>(f: F) -> T
where
    F: std::future::Future<Output = Result<T>>,
{
    match f.await {
        Ok(ok) => ok,
        Err(err) => {
            if log::log_enabled!(log::Level::Error) {
                log::error!("Crashed with error: {:?}", err);
            } else {
                eprintln!("Crashed with error: {err:?}");
            }

            std::process::exit(-1);
        }
    }
}

/// Runs the controller until a fatal error occurred or a shutdown is requested (e.g. SIGTERM).
pub async fn run(settings: Settings) -> Result<()> {
    let store = Data::new(
        ParticipationStore::open(settings.store.data_dir.clone())
            .context("Failed to open participation store")?,
    );
    let identity_ctx = Data::new(
        IdentityContext::from_config(&settings.identity)
            .context("Failed to initialize identity service client")?,
    );
    let booking_api = Data::new(
        BookingApiClient::from_config(&settings.booking)
            .context("Failed to initialize booking service client")?,
    );

    let cors_settings = settings.http.cors.clone();

    let http_server = HttpServer::new(move || {
        let cors = setup_cors(&cors_settings);

        App::new()
            .wrap(cors)
            .app_data(store.clone())
            .app_data(identity_ctx.clone())
            .app_data(booking_api.clone())
            .service(
                web::scope("/v1")
                    .wrap(api::v1::middleware::auth::BearerAuth {
                        identity_ctx: identity_ctx.clone(),
                    })
                    .service(api::v1::events::join)
                    .service(api::v1::events::leave)
                    .service(api::v1::events::get)
                    .service(api::v1::bookings::cancel),
            )
    });

    let address = (Ipv6Addr::UNSPECIFIED, settings.http.port);

    let http_server = http_server
        .bind(address)
        .with_context(|| format!("Failed to bind http server to {}:{}", address.0, address.1))?;

    log::info!("Startup finished");

    http_server.run().await?;

    Ok(())
}

fn setup_cors(settings: &settings::Cors) -> Cors {
    let mut cors = Cors::default();

    for origin in &settings.allowed_origin {
        cors = cors.allowed_origin(origin)
    }

    cors.allowed_header(header::CONTENT_TYPE)
        .allowed_header(header::AUTHORIZATION)
        .allow_any_method()
}
