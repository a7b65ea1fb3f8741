//! HTTP surface of the predictor.
//!
//! `GET /` serves a short index page, `GET /health` reports the loaded model
//! and `POST /predict` scores one JSON record. Every failure, including
//! rejections raised by warp itself, answers with `{"error": ...}`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Rejection, Reply};

use crate::common::config::ServerCfg;
use crate::common::error::{PassError, PassResult};
use crate::inference::Predictor;

const MAX_BODY_BYTES: u64 = 64 * 1024;

const INDEX_HTML: &str = concat!(
    "<!doctype html>\n",
    "<html><head><title>PassCompass</title></head><body>",
    "<h1>PassCompass</h1>",
    "<p>POST a student record as JSON to <code>/predict</code>.</p>",
    "</body></html>\n",
);

fn with_predictor(
    predictor: Arc<Predictor>,
) -> impl Filter<Extract = (Arc<Predictor>,), Error = Infallible> + Clone {
    warp::any().map(move || predictor.clone())
}

/// All routes of the prediction service.
pub fn routes(
    predictor: Arc<Predictor>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_predictor(predictor.clone()))
        .map(|predictor: Arc<Predictor>| {
            let version = predictor.version().map(|v| v.version);
            warp::reply::json(&json!({
                "status": "ok",
                "model_version": version,
                "threshold": predictor.model().threshold,
            }))
        });

    let predict = warp::path!("predict")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_predictor(predictor))
        .and_then(predict_handler);

    index
        .or(health)
        .or(predict)
        .recover(handle_rejection)
        .with(warp::trace::request())
}

fn parse_record(body: &[u8]) -> PassResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(PassError::invalid("request body must be a JSON object")),
        Err(err) => Err(PassError::invalid(format!("malformed JSON: {err}"))),
    }
}

fn json_error(status: StatusCode, message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
}

fn error_reply(err: &PassError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = match err {
        PassError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, &err.to_string())
}

async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(err) = rejection.find::<warp::reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, err.to_string())
    } else if let Some(err) = rejection.find::<warp::reject::LengthRequired>() {
        (StatusCode::LENGTH_REQUIRED, err.to_string())
    } else if let Some(err) = rejection.find::<warp::reject::MethodNotAllowed>() {
        (StatusCode::METHOD_NOT_ALLOWED, err.to_string())
    } else {
        tracing::error!(?rejection, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
    };
    Ok(json_error(status, &message))
}

async fn predict_handler(
    body: Bytes,
    predictor: Arc<Predictor>,
) -> Result<impl Reply, Infallible> {
    let outcome = parse_record(&body).and_then(|record| predictor.predict(&record));
    Ok(match outcome {
        Ok(prediction) => {
            warp::reply::with_status(warp::reply::json(&prediction), StatusCode::OK)
        }
        Err(err) => {
            tracing::warn!(error = %err, "prediction rejected");
            error_reply(&err)
        }
    })
}

/// Serve until Ctrl-C.
pub async fn serve(cfg: &ServerCfg, predictor: Predictor) -> PassResult<()> {
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .map_err(|err| {
            PassError::invalid(format!("bad listen address {}:{}: {err}", cfg.host, cfg.port))
        })?;
    let (bound, server) = warp::serve(routes(Arc::new(predictor)))
        .try_bind_with_graceful_shutdown(addr, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
        })
        .map_err(|err| PassError::internal(format!("cannot bind {addr}: {err}")))?;
    tracing::info!(%bound, "prediction server listening");
    server.await;
    tracing::info!("prediction server stopped");
    Ok(())
}
