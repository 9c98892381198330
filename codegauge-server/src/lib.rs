#![deny(missing_docs)]
//! CodeGauge server library.
//!
//! Hosts the REST endpoints for triggering analyses and fetching generated
//! reports, plus the daily scheduler thread. Embedded by the `codegauge`
//! CLI's `serve` subcommand and the standalone server binary.

pub mod openapi;
pub mod routes;
pub mod scheduler;

use actix_cors::Cors;
use actix_web::{App, HttpServer, http::header, middleware::Logger, web};

use codegauge_core::Settings;

use crate::routes::{
    AppState, download_report, download_weekly, generate_weekly, health, list_reports,
    list_weekly, openapi_json, run_all_analysis, run_duplicate_analysis,
    run_uncommented_analysis, status,
};

/// Start the scheduler (when enabled) and run the HTTP server until
/// shutdown.
pub fn run(settings: Settings) -> std::io::Result<()> {
    settings
        .ensure_directories()
        .map_err(|err| std::io::Error::other(err.to_string()))?;

    if settings.schedule.enabled {
        scheduler::spawn(settings.clone())?;
    } else {
        log::info!("daily scheduler disabled");
    }

    let origins = std::env::var("CODEGAUGE_UI_ORIGINS")
        .unwrap_or_else(|_| "http://127.0.0.1:4200,http://localhost:4200".to_string());
    let allowed_origins: Vec<String> = origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect();

    let listen_addr = settings.server.host.clone();
    let listen_port = settings.server.port;
    log::info!("listening on {listen_addr}:{listen_port}");

    let state = web::Data::new(AppState { settings });

    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            let mut cors = Cors::default()
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
                .max_age(3600);
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            App::new()
                .wrap(Logger::default())
                .wrap(cors)
                .app_data(state.clone())
                .service(health)
                .service(status)
                .service(run_uncommented_analysis)
                .service(run_duplicate_analysis)
                .service(run_all_analysis)
                .service(list_reports)
                .service(download_report)
                .service(generate_weekly)
                .service(list_weekly)
                .service(download_weekly)
                .service(openapi_json)
        })
        .bind((listen_addr, listen_port))?
        .run()
        .await
    })
}
